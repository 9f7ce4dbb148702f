use std::sync::Arc;
use std::time::Duration;

use pizzabot_agent::{AgentRuntime, GuardrailPolicy};
use pizzabot_core::audit::TracingAuditSink;
use pizzabot_core::catalog::source::JsonFileCatalogSource;
use pizzabot_core::catalog::CatalogStore;
use pizzabot_core::checkout::ports::PaymentGatewayError;
use pizzabot_core::checkout::CheckoutSettings;
use pizzabot_core::config::{AppConfig, ConfigError, LoadOptions};
use pizzabot_core::service::OrderingService;
use pizzabot_db::{connect_with_config, migrations, DbPool, SqlOrderStore};
use thiserror::Error;
use tracing::{info, warn};

use crate::gateway;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub catalog: Arc<CatalogStore>,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("payment gateway setup failed: {0}")]
    Gateway(#[source] PaymentGatewayError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires stores, collaborators, and the tool runtime. A catalog that fails
/// to load is logged and left for `/health` to report; catalog-dependent
/// tools fail until it is fixed and reloaded.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database ready"
    );

    let catalog = Arc::new(CatalogStore::new(Arc::new(JsonFileCatalogSource::new(
        config.catalog.path.clone(),
    ))));
    if let Err(error) = catalog.load() {
        warn!(
            event_name = "system.bootstrap.catalog_unavailable",
            correlation_id = "bootstrap",
            path = %config.catalog.path.display(),
            error = %error,
            "catalog failed to load; ordering tools are unavailable"
        );
    }

    let gateway = gateway::from_config(&config.payment).map_err(BootstrapError::Gateway)?;
    info!(
        event_name = "system.bootstrap.payment_gateway",
        correlation_id = "bootstrap",
        provider = gateway.name(),
        "payment gateway configured"
    );

    let service = OrderingService::new(
        catalog.clone(),
        Arc::from(gateway),
        Arc::new(SqlOrderStore::new(db_pool.clone())),
        Arc::new(TracingAuditSink),
        CheckoutSettings::from_config(&config),
    );
    let guardrails = GuardrailPolicy::from_config(&config.checkout);
    let runtime = AgentRuntime::new(Arc::new(service), guardrails)
        .with_payment_timeout(Duration::from_secs(config.payment.timeout_secs));

    Ok(Application { config, db_pool, catalog, runtime: Arc::new(runtime) })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pizzabot_core::catalog::CatalogStatus;
    use pizzabot_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn options(catalog_path: std::path::PathBuf) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                catalog_path: Some(catalog_path),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_loads_catalog_and_migrates() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"[{{"name": "Margherita", "price": 299, "category": "pizza"}}]"#)
            .expect("write menu");

        let app = bootstrap(options(file.path().to_path_buf())).await.expect("bootstrap");
        assert_eq!(app.catalog.status(), CatalogStatus::Loaded { items: 1 });

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name IN ('orders', 'order_lines')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(tables, 2);
    }

    #[tokio::test]
    async fn missing_catalog_does_not_stop_startup() {
        let app = bootstrap(options("/nonexistent/menu.json".into())).await.expect("bootstrap");
        assert!(matches!(app.catalog.status(), CatalogStatus::Failed { .. }));
    }
}
