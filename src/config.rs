use secrecy::SecretBox;
use std::env;
use std::time::Duration;
use thiserror::Error;
use ts3_query::QueryConfig;

pub const API_KEY_VAR: &str = "TS3_API_KEY";
pub const ADDRESS_VAR: &str = "TS3_CLIENTQUERY_ADDR";
pub const RETRY_ATTEMPTS_VAR: &str = "TS3_RETRY_ATTEMPTS";
pub const RETRY_DELAY_VAR: &str = "TS3_RETRY_DELAY_MS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid API key format: {reason}")]
    InvalidKeyFormat { reason: String },
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}

/// Connection settings plus the optional API key from the environment
#[derive(Debug)]
pub struct DeckConfig {
    pub query: QueryConfig,
    api_key: Option<SecretBox<String>>,
}

impl DeckConfig {
    /// Load from the process environment (and `.env` if present)
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; unset variables keep the defaults
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut query = QueryConfig::default();

        if let Some(address) = lookup(ADDRESS_VAR).filter(|a| !a.trim().is_empty()) {
            query.address = address.trim().to_string();
        }
        if let Some(attempts) = lookup(RETRY_ATTEMPTS_VAR) {
            query.retry.attempts = parse_var(RETRY_ATTEMPTS_VAR, &attempts)?;
            if query.retry.attempts == 0 {
                return Err(ConfigError::InvalidValue {
                    var: RETRY_ATTEMPTS_VAR.to_string(),
                    value: attempts,
                });
            }
        }
        if let Some(delay) = lookup(RETRY_DELAY_VAR) {
            query.retry.delay = Duration::from_millis(parse_var(RETRY_DELAY_VAR, &delay)?);
        }

        let api_key = match lookup(API_KEY_VAR) {
            Some(key) => Some(secret_api_key(&key)?),
            None => None,
        };

        Ok(Self { query, api_key })
    }

    pub fn api_key(&self) -> Result<&SecretBox<String>, ConfigError> {
        self.api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar(API_KEY_VAR.to_string()))
    }

    /// Prefer an explicitly given key over the environment
    pub fn override_api_key(&mut self, key: &str) -> Result<(), ConfigError> {
        self.api_key = Some(secret_api_key(key)?);
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Validate a ClientQuery API key.
///
/// The key is sent verbatim as `auth apikey=<key>`, so whitespace would split
/// the command.
pub fn validate_api_key(key: &str) -> Result<(), ConfigError> {
    if key.trim().is_empty() {
        return Err(ConfigError::InvalidKeyFormat {
            reason: "API key cannot be empty".to_string(),
        });
    }
    if key.chars().any(char::is_whitespace) || key.contains('|') {
        return Err(ConfigError::InvalidKeyFormat {
            reason: "API key cannot contain whitespace or '|'".to_string(),
        });
    }
    Ok(())
}

pub fn secret_api_key(key: &str) -> Result<SecretBox<String>, ConfigError> {
    let key = key.trim();
    validate_api_key(key)?;
    Ok(SecretBox::new(Box::new(key.to_string())))
}

/// Load configuration with helpful error messages
pub fn load_config() -> Result<DeckConfig, ConfigError> {
    match DeckConfig::load() {
        Ok(config) => {
            log::info!("Loaded ClientQuery configuration for {}", config.query.address);
            Ok(config)
        }
        Err(e) => {
            log::error!("Configuration error: {}", e);
            if let ConfigError::InvalidKeyFormat { .. } = e {
                log::error!("Copy the API key from TeamSpeak: Tools > Options > Addons > ClientQuery");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = DeckConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.query.address, "127.0.0.1:25639");
        assert_eq!(config.query.retry.attempts, 10);
        assert!(matches!(config.api_key(), Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let config = DeckConfig::from_lookup(lookup(&[
            (ADDRESS_VAR, "127.0.0.1:30000"),
            (RETRY_ATTEMPTS_VAR, "3"),
            (RETRY_DELAY_VAR, "5"),
            (API_KEY_VAR, " ABCD-1234 "),
        ]))
        .unwrap();

        assert_eq!(config.query.address, "127.0.0.1:30000");
        assert_eq!(config.query.retry.attempts, 3);
        assert_eq!(config.query.retry.delay, Duration::from_millis(5));
        assert_eq!(config.api_key().unwrap().expose_secret(), "ABCD-1234");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            DeckConfig::from_lookup(lookup(&[(RETRY_ATTEMPTS_VAR, "many")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            DeckConfig::from_lookup(lookup(&[(RETRY_ATTEMPTS_VAR, "0")])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_key_validation() {
        assert!(validate_api_key("ABCD-EFGH-IJKL-MNOP-QRST-UVWX").is_ok());
        assert!(validate_api_key("").is_err());
        assert!(validate_api_key("two words").is_err());
        assert!(validate_api_key("pipe|key").is_err());
    }
}
