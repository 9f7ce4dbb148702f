use std::sync::Arc;

use pizzabot_core::catalog::source::JsonFileCatalogSource;
use pizzabot_core::catalog::CatalogStore;
use pizzabot_core::config::{AppConfig, LoadOptions, PaymentProvider};
use pizzabot_db::connect_with_config;
use serde::Serialize;

use crate::commands::{block_on, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] = ["catalog_load", "database_connectivity", "payment_readiness"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.push(check_catalog(&config));
            checks.push(check_database_connectivity(&config));
            checks.push(check_payment_readiness(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let store =
        CatalogStore::new(Arc::new(JsonFileCatalogSource::new(config.catalog.path.clone())));
    match store.load() {
        Ok(index) => DoctorCheck::pass(
            "catalog_load",
            format!("{} menu items loaded from `{}`", index.len(), config.catalog.path.display()),
        ),
        Err(error) => DoctorCheck::fail("catalog_load", error.to_string()),
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let result = block_on("doctor", async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(Ok(())) => DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        ),
        Ok(Err(error)) => DoctorCheck::fail("database_connectivity", error),
        Err(failure) => DoctorCheck::fail("database_connectivity", failure.output),
    }
}

fn check_payment_readiness(config: &AppConfig) -> DoctorCheck {
    match config.payment.provider {
        PaymentProvider::Sandbox => {
            DoctorCheck::pass("payment_readiness", "sandbox provider; charges are simulated")
        }
        PaymentProvider::Http => match (&config.payment.endpoint, &config.payment.api_key) {
            (Some(endpoint), Some(_)) => {
                DoctorCheck::pass("payment_readiness", format!("http provider at `{endpoint}`"))
            }
            _ => DoctorCheck::fail(
                "payment_readiness",
                "http provider needs payment.endpoint and payment.api_key",
            ),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
