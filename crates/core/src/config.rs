use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub payment: PaymentConfig,
    pub checkout: CheckoutConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub path: PathBuf,
    pub currency: String,
    pub minor_unit_exponent: u32,
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub provider: PaymentProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    pub enabled: bool,
    pub max_quantity_per_add: u32,
    pub max_phrase_chars: usize,
    pub delivery_eta_min_minutes: u32,
    pub delivery_eta_max_minutes: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Sandbox,
    Http,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub payment_provider: Option<PaymentProvider>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://pizzabot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            catalog: CatalogConfig {
                path: PathBuf::from("menu.json"),
                currency: "INR".to_string(),
                minor_unit_exponent: 2,
            },
            payment: PaymentConfig {
                provider: PaymentProvider::Sandbox,
                endpoint: None,
                api_key: None,
                timeout_secs: 20,
            },
            checkout: CheckoutConfig {
                enabled: true,
                max_quantity_per_add: 50,
                max_phrase_chars: 200,
                delivery_eta_min_minutes: 30,
                delivery_eta_max_minutes: 45,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for PaymentProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Validation(format!(
                "unsupported payment provider `{other}` (expected sandbox|http)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pizzabot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = path;
            }
            if let Some(currency) = catalog.currency {
                self.catalog.currency = currency;
            }
            if let Some(exponent) = catalog.minor_unit_exponent {
                self.catalog.minor_unit_exponent = exponent;
            }
        }

        if let Some(payment) = patch.payment {
            if let Some(provider) = payment.provider {
                self.payment.provider = provider;
            }
            if let Some(endpoint) = payment.endpoint {
                self.payment.endpoint = Some(endpoint);
            }
            if let Some(payment_api_key_value) = payment.api_key {
                self.payment.api_key = Some(SecretString::from(payment_api_key_value));
            }
            if let Some(timeout_secs) = payment.timeout_secs {
                self.payment.timeout_secs = timeout_secs;
            }
        }

        if let Some(checkout) = patch.checkout {
            if let Some(enabled) = checkout.enabled {
                self.checkout.enabled = enabled;
            }
            if let Some(max_quantity_per_add) = checkout.max_quantity_per_add {
                self.checkout.max_quantity_per_add = max_quantity_per_add;
            }
            if let Some(max_phrase_chars) = checkout.max_phrase_chars {
                self.checkout.max_phrase_chars = max_phrase_chars;
            }
            if let Some(minutes) = checkout.delivery_eta_min_minutes {
                self.checkout.delivery_eta_min_minutes = minutes;
            }
            if let Some(minutes) = checkout.delivery_eta_max_minutes {
                self.checkout.delivery_eta_max_minutes = minutes;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PIZZABOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PIZZABOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("PIZZABOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PIZZABOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PIZZABOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PIZZABOT_CATALOG_PATH") {
            self.catalog.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("PIZZABOT_CATALOG_CURRENCY") {
            self.catalog.currency = value;
        }
        if let Some(value) = read_env("PIZZABOT_CATALOG_MINOR_UNIT_EXPONENT") {
            self.catalog.minor_unit_exponent =
                parse_u32("PIZZABOT_CATALOG_MINOR_UNIT_EXPONENT", &value)?;
        }

        if let Some(value) = read_env("PIZZABOT_PAYMENT_PROVIDER") {
            self.payment.provider = value.parse()?;
        }
        if let Some(value) = read_env("PIZZABOT_PAYMENT_ENDPOINT") {
            self.payment.endpoint = Some(value);
        }
        if let Some(value) = read_env("PIZZABOT_PAYMENT_API_KEY") {
            self.payment.api_key = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("PIZZABOT_PAYMENT_TIMEOUT_SECS") {
            self.payment.timeout_secs = parse_u64("PIZZABOT_PAYMENT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PIZZABOT_CHECKOUT_ENABLED") {
            self.checkout.enabled = parse_bool("PIZZABOT_CHECKOUT_ENABLED", &value)?;
        }
        if let Some(value) = read_env("PIZZABOT_CHECKOUT_MAX_QUANTITY_PER_ADD") {
            self.checkout.max_quantity_per_add =
                parse_u32("PIZZABOT_CHECKOUT_MAX_QUANTITY_PER_ADD", &value)?;
        }
        if let Some(value) = read_env("PIZZABOT_CHECKOUT_MAX_PHRASE_CHARS") {
            self.checkout.max_phrase_chars =
                parse_u32("PIZZABOT_CHECKOUT_MAX_PHRASE_CHARS", &value)? as usize;
        }
        if let Some(value) = read_env("PIZZABOT_CHECKOUT_DELIVERY_ETA_MIN_MINUTES") {
            self.checkout.delivery_eta_min_minutes =
                parse_u32("PIZZABOT_CHECKOUT_DELIVERY_ETA_MIN_MINUTES", &value)?;
        }
        if let Some(value) = read_env("PIZZABOT_CHECKOUT_DELIVERY_ETA_MAX_MINUTES") {
            self.checkout.delivery_eta_max_minutes =
                parse_u32("PIZZABOT_CHECKOUT_DELIVERY_ETA_MAX_MINUTES", &value)?;
        }

        if let Some(value) = read_env("PIZZABOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PIZZABOT_SERVER_PORT") {
            self.server.port = parse_u16("PIZZABOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PIZZABOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PIZZABOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PIZZABOT_LOGGING_LEVEL").or_else(|| read_env("PIZZABOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PIZZABOT_LOGGING_FORMAT").or_else(|| read_env("PIZZABOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = catalog_path;
        }
        if let Some(provider) = overrides.payment_provider {
            self.payment.provider = provider;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_catalog(&self.catalog)?;
        validate_payment(&self.payment)?;
        validate_checkout(&self.checkout)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pizzabot.toml"), PathBuf::from("config/pizzabot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("catalog.path must not be empty".to_string()));
    }

    let currency = catalog.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "catalog.currency must be a three-letter ISO code such as INR (got `{currency}`)"
        )));
    }

    if catalog.minor_unit_exponent > 4 {
        return Err(ConfigError::Validation(
            "catalog.minor_unit_exponent must be in range 0..=4".to_string(),
        ));
    }

    Ok(())
}

fn validate_payment(payment: &PaymentConfig) -> Result<(), ConfigError> {
    if payment.timeout_secs == 0 || payment.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "payment.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if payment.provider == PaymentProvider::Http {
        let endpoint = payment.endpoint.as_deref().map(str::trim).unwrap_or_default();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(
                "payment.endpoint must start with http:// or https:// for the http provider"
                    .to_string(),
            ));
        }

        let missing_key = payment
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_key {
            return Err(ConfigError::Validation(
                "payment.api_key is required for the http provider".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_checkout(checkout: &CheckoutConfig) -> Result<(), ConfigError> {
    if checkout.max_quantity_per_add == 0 || checkout.max_quantity_per_add > 9999 {
        return Err(ConfigError::Validation(
            "checkout.max_quantity_per_add must be in range 1..=9999".to_string(),
        ));
    }

    if checkout.max_phrase_chars == 0 {
        return Err(ConfigError::Validation(
            "checkout.max_phrase_chars must be greater than zero".to_string(),
        ));
    }

    if checkout.delivery_eta_min_minutes == 0
        || checkout.delivery_eta_min_minutes > checkout.delivery_eta_max_minutes
    {
        return Err(ConfigError::Validation(
            "checkout delivery ETA window must satisfy 0 < min <= max".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    catalog: Option<CatalogPatch>,
    payment: Option<PaymentPatch>,
    checkout: Option<CheckoutPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
    currency: Option<String>,
    minor_unit_exponent: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentPatch {
    provider: Option<PaymentProvider>,
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckoutPatch {
    enabled: Option<bool>,
    max_quantity_per_add: Option<u32>,
    max_phrase_chars: Option<usize>,
    delivery_eta_min_minutes: Option<u32>,
    delivery_eta_max_minutes: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, PaymentProvider};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_a_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("does-not-exist/pizzabot.toml")),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.catalog.currency == "INR", "default currency should be INR")?;
        ensure(config.catalog.minor_unit_exponent == 2, "default exponent should be 2")?;
        ensure(config.payment.provider == PaymentProvider::Sandbox, "sandbox is the default")?;
        ensure(
            config.checkout.delivery_eta_min_minutes == 30
                && config.checkout.delivery_eta_max_minutes == 45,
            "default delivery window should be 30-45 minutes",
        )?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PAYMENT_API_KEY", "pk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pizzabot.toml");
            fs::write(
                &path,
                r#"
[payment]
provider = "http"
endpoint = "https://payments.example.test/charges"
api_key = "${TEST_PAYMENT_API_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.payment.api_key.as_ref().map(|key| key.expose_secret() == "pk-from-env")
                    == Some(true),
                "payment api key should be loaded from environment",
            )?;
            ensure(
                !format!("{:?}", config.payment).contains("pk-from-env"),
                "payment api key must not appear in debug output",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_PAYMENT_API_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PIZZABOT_LOG_LEVEL", "warn");
        env::set_var("PIZZABOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["PIZZABOT_LOG_LEVEL", "PIZZABOT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PIZZABOT_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("PIZZABOT_CATALOG_CURRENCY", "USD");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pizzabot.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[catalog]
path = "menus/from-file.json"
currency = "EUR"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.catalog.currency == "USD", "env currency should win over file")?;
            ensure(
                config.catalog.path == PathBuf::from("menus/from-file.json"),
                "file catalog path should win over defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["PIZZABOT_DATABASE_URL", "PIZZABOT_CATALOG_CURRENCY"]);
        result
    }

    #[test]
    fn http_payment_provider_requires_endpoint_and_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PIZZABOT_PAYMENT_PROVIDER", "http");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };

            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("payment.endpoint")
                ),
                "validation error should name the missing endpoint",
            )?;
            Ok(())
        })();

        clear_vars(&["PIZZABOT_PAYMENT_PROVIDER"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PIZZABOT_SERVER_PORT", "not-a-port");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };

            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. } if key == "PIZZABOT_SERVER_PORT"
                ),
                "invalid port should be reported with its env key",
            )?;
            Ok(())
        })();

        clear_vars(&["PIZZABOT_SERVER_PORT"]);
        result
    }

    #[test]
    fn inverted_delivery_window_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PIZZABOT_CHECKOUT_DELIVERY_ETA_MIN_MINUTES", "60");

        let result = (|| -> Result<(), String> {
            let outcome = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(outcome, Err(ConfigError::Validation(_))),
                "min above max should fail validation",
            )?;
            Ok(())
        })();

        clear_vars(&["PIZZABOT_CHECKOUT_DELIVERY_ETA_MIN_MINUTES"]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("missing/pizzabot.toml")),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }
}
