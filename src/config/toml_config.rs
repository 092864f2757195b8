use crate::utils::error::{LookupError, Result};
use crate::utils::validation::{validate_bounds, validate_credential, validate_endpoint, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub primary: PrimaryConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// OAuth2-protected food database queried first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub token_url: String,
    pub scope: String,
    pub timeout_ms: u64,
    pub max_results: usize,
    pub region: Option<String>,
    pub language: Option<String>,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: String::new(),
            client_secret: String::new(),
            base_url: "https://platform.fatsecret.com/rest".to_string(),
            token_url: "https://oauth.fatsecret.com/connect/token".to_string(),
            scope: "basic".to_string(),
            timeout_ms: 10_000,
            max_results: 20,
            region: None,
            language: None,
        }
    }
}

impl PrimaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Unauthenticated product database used when the primary source fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://world.openfoodfacts.org".to_string(),
            timeout_ms: 10_000,
            user_agent: concat!("nutrition-lookup/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FallbackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
        }
    }
}

impl LookupConfig {
    /// Loads and parses a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| LookupError::Config {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value. Unknown variables are
    /// left in place and rejected later by validation.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| LookupError::Config {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Builds the configuration from `NUTRITION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let primary = &mut config.primary;

        if let Some(v) = lookup("NUTRITION_PRIMARY_ENABLED") {
            primary.enabled = parse_env("NUTRITION_PRIMARY_ENABLED", &v)?;
        }
        if let Some(v) = lookup("NUTRITION_CLIENT_ID") {
            primary.client_id = v;
        }
        if let Some(v) = lookup("NUTRITION_CLIENT_SECRET") {
            primary.client_secret = v;
        }
        if let Some(v) = lookup("NUTRITION_BASE_URL") {
            primary.base_url = v;
        }
        if let Some(v) = lookup("NUTRITION_TOKEN_URL") {
            primary.token_url = v;
        }
        if let Some(v) = lookup("NUTRITION_TIMEOUT_MS") {
            primary.timeout_ms = parse_env("NUTRITION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("NUTRITION_MAX_RESULTS") {
            primary.max_results = parse_env("NUTRITION_MAX_RESULTS", &v)?;
        }
        primary.region = lookup("NUTRITION_REGION").filter(|v| !v.trim().is_empty());
        primary.language = lookup("NUTRITION_LANGUAGE").filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup("NUTRITION_FALLBACK_ENABLED") {
            config.fallback.enabled = parse_env("NUTRITION_FALLBACK_ENABLED", &v)?;
        }
        if let Some(v) = lookup("NUTRITION_FALLBACK_BASE_URL") {
            config.fallback.base_url = v;
        }

        Ok(config)
    }

    pub fn validate_config(&self) -> Result<()> {
        let primary = &self.primary;
        if primary.enabled {
            validate_credential("primary.client_id", &primary.client_id)?;
            validate_credential("primary.client_secret", &primary.client_secret)?;
            validate_endpoint("primary.base_url", &primary.base_url)?;
            validate_endpoint("primary.token_url", &primary.token_url)?;
            validate_bounds("primary.timeout_ms", primary.timeout_ms, 1..=120_000)?;
            validate_bounds("primary.max_results", primary.max_results, 1..=50)?;
        }

        if self.fallback.enabled {
            validate_endpoint("fallback.base_url", &self.fallback.base_url)?;
            validate_bounds("fallback.timeout_ms", self.fallback.timeout_ms, 1..=120_000)?;
        }

        validate_bounds("cache.capacity", self.cache.capacity, 1..=100_000)?;
        validate_bounds("cache.ttl_seconds", self.cache.ttl_seconds, 1..=86_400)?;
        validate_bounds("retry.max_attempts", self.retry.max_attempts, 1..=10)?;

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| LookupError::InvalidConfigValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("cannot parse as {}", std::any::type_name::<T>()),
        })
}

impl Validate for LookupConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[primary]
client_id = "abc"
client_secret = "shh"
base_url = "https://api.example.com/rest"
timeout_ms = 5000
max_results = 10
region = "US"
language = "en"

[fallback]
enabled = false

[cache]
ttl_seconds = 60
capacity = 5

[retry]
max_attempts = 2
base_delay_ms = 10
"#;

        let config = LookupConfig::from_toml_str(toml_content).unwrap();

        assert!(config.primary.enabled);
        assert_eq!(config.primary.client_id, "abc");
        assert_eq!(config.primary.max_results, 10);
        assert_eq!(config.primary.region.as_deref(), Some("US"));
        assert_eq!(config.primary.scope, "basic");
        assert!(!config.fallback.enabled);
        assert_eq!(config.cache.capacity, 5);
        assert_eq!(config.retry.max_attempts, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = LookupConfig::from_toml_str("").unwrap();
        assert_eq!(config.cache.ttl_seconds, 300);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.primary.timeout_ms, 10_000);
        assert!(config.fallback.enabled);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("NUTRITION_TEST_CLIENT_ID", "from-env");

        let toml_content = r#"
[primary]
client_id = "${NUTRITION_TEST_CLIENT_ID}"
client_secret = "secret"
"#;

        let config = LookupConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.primary.client_id, "from-env");

        std::env::remove_var("NUTRITION_TEST_CLIENT_ID");
    }

    #[test]
    fn test_unresolved_credential_fails_validation() {
        let toml_content = r#"
[primary]
client_id = "${NUTRITION_TEST_SURELY_UNSET_VAR}"
client_secret = "secret"
"#;

        let config = LookupConfig::from_toml_str(toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(LookupError::Config { ref field, .. }) if field == "primary.client_id"
        ));
    }

    #[test]
    fn test_missing_credentials_only_matter_when_enabled() {
        let mut config = LookupConfig::default();
        assert!(config.validate().is_err());

        config.primary.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let toml_content = r#"
[primary]
enabled = false

[fallback]
base_url = "not-a-url"
"#;
        let config = LookupConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("NUTRITION_CLIENT_ID", "id"),
            ("NUTRITION_CLIENT_SECRET", "secret"),
            ("NUTRITION_MAX_RESULTS", "15"),
            ("NUTRITION_FALLBACK_ENABLED", "false"),
            ("NUTRITION_LANGUAGE", "fr"),
        ]
        .into_iter()
        .collect();

        let config =
            LookupConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.primary.client_id, "id");
        assert_eq!(config.primary.max_results, 15);
        assert_eq!(config.primary.language.as_deref(), Some("fr"));
        assert_eq!(config.primary.region, None);
        assert!(!config.fallback.enabled);
    }

    #[test]
    fn test_from_lookup_rejects_bad_number() {
        let result = LookupConfig::from_lookup(|key| {
            (key == "NUTRITION_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(matches!(
            result,
            Err(LookupError::InvalidConfigValue { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[primary]
client_id = "file-id"
client_secret = "file-secret"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = LookupConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.primary.client_id, "file-id");
    }
}
