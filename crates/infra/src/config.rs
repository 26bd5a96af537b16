//! Process configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. `stockledger.toml` in the working directory (optional)
//! 3. `STOCKLEDGER__*` environment variables, `__` separating sections
//!    (e.g. `STOCKLEDGER__GUARD__MAX_ATTEMPTS=5`)

use std::time::Duration;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

use stockledger_observability::LogSettings;

use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "stockledger";
pub const ENV_PREFIX: &str = "STOCKLEDGER";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    /// Tries per command when the pair revision keeps moving, first try included.
    pub max_attempts: u32,
    /// Base backoff between tries, doubled each retry.
    pub backoff_ms: u64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 10,
        }
    }
}

impl GuardSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.backoff_ms);
        RetryPolicy::exponential(self.max_attempts.max(1), base, base.saturating_mul(16))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Postgres connection string. In-memory stores are used when absent.
    pub database_url: Option<String>,
    pub log: LogSettings,
    pub guard: GuardSettings,
    pub ledger: LedgerSettings,
}

impl AppConfig {
    /// Load from `stockledger.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
                .add_source(Environment::with_prefix(ENV_PREFIX).separator("__")),
        )
    }

    /// Load from an explicit file; environment variables still override it.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(path))
                .add_source(Environment::with_prefix(ENV_PREFIX).separator("__")),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.default_page_size == 0 || self.ledger.max_page_size == 0 {
            return Err(ConfigError::Message("ledger page sizes must be positive".to_string()));
        }
        if self.ledger.default_page_size > self.ledger.max_page_size {
            return Err(ConfigError::Message(format!(
                "ledger.default_page_size ({}) exceeds ledger.max_page_size ({})",
                self.ledger.default_page_size, self.ledger.max_page_size
            )));
        }
        if self.guard.max_attempts == 0 {
            return Err(ConfigError::Message("guard.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let config = parse("").unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.guard, GuardSettings::default());
        assert_eq!(config.ledger.default_page_size, 10);
        assert_eq!(config.ledger.max_page_size, 100);
    }

    #[test]
    fn sections_override_individual_fields() {
        let config = parse(
            r#"
            database_url = "postgres://localhost/stock"

            [guard]
            max_attempts = 5

            [log]
            json = false
            "#,
        )
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/stock"));
        assert_eq!(config.guard.max_attempts, 5);
        assert_eq!(config.guard.backoff_ms, 10);
        assert!(!config.log.json);
    }

    #[test]
    fn inconsistent_page_sizes_are_rejected() {
        let err = parse(
            r#"
            [ledger]
            default_page_size = 50
            max_page_size = 20
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("default_page_size"));
    }

    #[test]
    fn explicit_file_is_required_and_read() {
        assert!(AppConfig::load_from("no/such/stockledger-config.toml").is_err());

        let path = std::env::temp_dir().join(format!("stockledger-{}.toml", std::process::id()));
        std::fs::write(&path, "[ledger]\nmax_page_size = 40\n").unwrap();
        let config = AppConfig::load_from(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.ledger.max_page_size, 40);
        assert_eq!(config.ledger.default_page_size, 10);
    }

    #[test]
    fn guard_settings_become_a_bounded_policy() {
        let policy = GuardSettings::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
    }
}
