use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pizzabot_core::config::AppConfig;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .payment
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field::new("database.url", &config.database.url, &["PIZZABOT_DATABASE_URL"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["PIZZABOT_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["PIZZABOT_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "catalog.path",
            config.catalog.path.display().to_string(),
            &["PIZZABOT_CATALOG_PATH"],
        ),
        Field::new("catalog.currency", &config.catalog.currency, &["PIZZABOT_CATALOG_CURRENCY"]),
        Field::new(
            "catalog.minor_unit_exponent",
            config.catalog.minor_unit_exponent.to_string(),
            &["PIZZABOT_CATALOG_MINOR_UNIT_EXPONENT"],
        ),
        Field::new(
            "payment.provider",
            format!("{:?}", config.payment.provider).to_lowercase(),
            &["PIZZABOT_PAYMENT_PROVIDER"],
        ),
        Field::new(
            "payment.endpoint",
            config.payment.endpoint.as_deref().unwrap_or("<unset>"),
            &["PIZZABOT_PAYMENT_ENDPOINT"],
        ),
        Field::new("payment.api_key", api_key, &["PIZZABOT_PAYMENT_API_KEY"]),
        Field::new(
            "payment.timeout_secs",
            config.payment.timeout_secs.to_string(),
            &["PIZZABOT_PAYMENT_TIMEOUT_SECS"],
        ),
        Field::new(
            "checkout.enabled",
            config.checkout.enabled.to_string(),
            &["PIZZABOT_CHECKOUT_ENABLED"],
        ),
        Field::new(
            "checkout.max_quantity_per_add",
            config.checkout.max_quantity_per_add.to_string(),
            &["PIZZABOT_CHECKOUT_MAX_QUANTITY_PER_ADD"],
        ),
        Field::new(
            "checkout.max_phrase_chars",
            config.checkout.max_phrase_chars.to_string(),
            &["PIZZABOT_CHECKOUT_MAX_PHRASE_CHARS"],
        ),
        Field::new(
            "checkout.delivery_eta_min_minutes",
            config.checkout.delivery_eta_min_minutes.to_string(),
            &["PIZZABOT_CHECKOUT_DELIVERY_ETA_MIN_MINUTES"],
        ),
        Field::new(
            "checkout.delivery_eta_max_minutes",
            config.checkout.delivery_eta_max_minutes.to_string(),
            &["PIZZABOT_CHECKOUT_DELIVERY_ETA_MAX_MINUTES"],
        ),
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["PIZZABOT_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["PIZZABOT_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["PIZZABOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["PIZZABOT_LOGGING_LEVEL", "PIZZABOT_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["PIZZABOT_LOGGING_FORMAT", "PIZZABOT_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["pizzabot.toml", "config/pizzabot.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short prefix such as `sk_live` so operators can tell keys apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.rsplit_once('_') {
        return format!("{prefix}_***");
    }

    "<redacted>".to_string()
}
