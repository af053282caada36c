use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::duration::{deserialize_duration, serialize_duration};

/// Environment variable overriding the quote cache TTL, in whole minutes.
pub const CACHE_TTL_MINUTES_ENV: &str = "PRICE_CACHE_TTL_MINUTES";
pub const FMP_API_KEY_ENV: &str = "FMP_API_KEY";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default display currency.
fn default_display_currency() -> String {
    "USD".to_string()
}

/// Default quote cache TTL (20 minutes).
fn default_cache_ttl() -> Duration {
    Duration::from_secs(20 * 60)
}

/// Default expired-quote sweep interval (1 hour).
fn default_sweep_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_gemini_model() -> String {
    "gemini-3-flash".to_string()
}

/// Price cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// How long a fetched quote is served from the cache.
    #[serde(
        default = "default_cache_ttl",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub cache_ttl: Duration,

    /// How often expired quotes are purged in the background.
    #[serde(
        default = "default_sweep_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub sweep_interval: Duration,

    /// Optional JSON file for a cache that survives restarts. In-memory when unset.
    pub cache_path: Option<PathBuf>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cache_ttl: default_cache_ttl(),
            sweep_interval: default_sweep_interval(),
            cache_path: None,
        }
    }
}

/// Price provider credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Financial Modeling Prep key for US stock quotes.
    #[serde(
        deserialize_with = "deserialize_secret",
        serialize_with = "serialize_redacted"
    )]
    pub fmp_api_key: Option<SecretString>,

    /// Gemini key. The generative fallback is disabled without it.
    #[serde(
        deserialize_with = "deserialize_secret",
        serialize_with = "serialize_redacted"
    )]
    pub gemini_api_key: Option<SecretString>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    pub fmp_base_url: Option<String>,
    pub twse_proxy_url: Option<String>,
    pub binance_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            fmp_api_key: None,
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            fmp_base_url: None,
            twse_proxy_url: None,
            binance_base_url: None,
            gemini_base_url: None,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(non_empty(value).map(SecretString::from))
}

fn serialize_redacted<S>(value: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(_) => serializer.serialize_some("[REDACTED]"),
        None => serializer.serialize_none(),
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Currency used when a user's profile does not name one (e.g., "USD").
    #[serde(default = "default_display_currency")]
    pub display_currency: String,

    /// Price cache settings.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Price provider settings.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_currency: default_display_currency(),
            pricing: PricingConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup. Invalid values are
    /// logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(CACHE_TTL_MINUTES_ENV) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|minutes| *minutes > 0)
                .and_then(|minutes| minutes.checked_mul(60));
            match secs {
                Some(secs) => self.pricing.cache_ttl = Duration::from_secs(secs),
                None => warn!(
                    variable = CACHE_TTL_MINUTES_ENV,
                    value = %raw,
                    "ignoring invalid cache TTL override"
                ),
            }
        }

        if let Some(key) = non_empty(lookup(FMP_API_KEY_ENV)) {
            self.providers.fmp_api_key = Some(SecretString::from(key));
        }
        if let Some(key) = non_empty(lookup(GEMINI_API_KEY_ENV)) {
            self.providers.gemini_api_key = Some(SecretString::from(key));
        }
    }

    /// Resolve a relative `cache_path` against the config file's directory.
    pub fn resolve_cache_path(&self, config_dir: &Path) -> Option<PathBuf> {
        match &self.pricing.cache_path {
            Some(path) if path.is_absolute() => Some(path.clone()),
            Some(path) => Some(config_dir.join(path)),
            None => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display_currency, "USD");
        assert_eq!(config.pricing.cache_ttl, Duration::from_secs(20 * 60));
        assert_eq!(config.pricing.sweep_interval, Duration::from_secs(60 * 60));
        assert!(config.pricing.cache_path.is_none());
        assert_eq!(config.providers.gemini_model, "gemini-3-flash");
    }

    #[test]
    fn test_load_empty_config() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("assetbook.toml");

        std::fs::File::create(&config_path)?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.display_currency, "USD");
        assert_eq!(config.pricing.cache_ttl, Duration::from_secs(20 * 60));

        Ok(())
    }

    #[test]
    fn test_load_pricing_config() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("assetbook.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "display_currency = \"TWD\"")?;
        writeln!(file, "[pricing]")?;
        writeln!(file, "cache_ttl = \"5m\"")?;
        writeln!(file, "sweep_interval = \"30m\"")?;
        writeln!(file, "cache_path = \"cache/quotes.json\"")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.display_currency, "TWD");
        assert_eq!(config.pricing.cache_ttl, Duration::from_secs(5 * 60));
        assert_eq!(config.pricing.sweep_interval, Duration::from_secs(30 * 60));
        assert_eq!(
            config.resolve_cache_path(dir.path()),
            Some(dir.path().join("cache/quotes.json"))
        );

        Ok(())
    }

    #[test]
    fn test_load_providers_config() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("assetbook.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "[providers]")?;
        writeln!(file, "fmp_api_key = \"fmp-secret\"")?;
        writeln!(file, "gemini_model = \"gemini-2.5-flash\"")?;

        let config = Config::load(&config_path)?;
        assert_eq!(
            config
                .providers
                .fmp_api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string()),
            Some("fmp-secret".to_string())
        );
        assert!(config.providers.gemini_api_key.is_none());
        assert_eq!(config.providers.gemini_model, "gemini-2.5-flash");

        Ok(())
    }

    #[test]
    fn test_invalid_duration_is_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("assetbook.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "[pricing]")?;
        writeln!(file, "cache_ttl = \"soon\"")?;

        assert!(Config::load(&config_path).is_err());
        Ok(())
    }

    #[test]
    fn test_config_load_or_default_missing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("missing.toml");

        let config = Config::load_or_default(&config_path)?;
        assert_eq!(config.display_currency, "USD");

        Ok(())
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides_from(env(&[
            (CACHE_TTL_MINUTES_ENV, "45"),
            (FMP_API_KEY_ENV, "from-env"),
            (GEMINI_API_KEY_ENV, "  "),
        ]));

        assert_eq!(config.pricing.cache_ttl, Duration::from_secs(45 * 60));
        assert_eq!(
            config
                .providers
                .fmp_api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string()),
            Some("from-env".to_string())
        );
        assert!(config.providers.gemini_api_key.is_none());
    }

    #[test]
    fn test_invalid_ttl_override_is_ignored() {
        let too_large = u64::MAX.to_string();
        for raw in ["0", "-5", "twenty", too_large.as_str()] {
            let mut config = Config::default();
            config.apply_overrides_from(env(&[(CACHE_TTL_MINUTES_ENV, raw)]));
            assert_eq!(config.pricing.cache_ttl, Duration::from_secs(20 * 60));
        }
    }

    #[test]
    fn test_serialized_config_redacts_secrets() -> Result<()> {
        let mut config = Config::default();
        config.providers.gemini_api_key = Some(SecretString::from("super-secret".to_string()));

        let rendered = toml::to_string(&config)?;
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("cache_ttl = \"20m\""));

        Ok(())
    }
}
