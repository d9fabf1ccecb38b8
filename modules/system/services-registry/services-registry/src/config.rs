use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Environment variable prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "SERVICES_REGISTRY__";

/// Configuration for the services registry module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesRegistryConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub integrity: IntegrityConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_dsn")]
    pub dsn: String,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: default_dsn(),
            run_migrations: true,
        }
    }
}

/// Hex-encoded HMAC keys. `key` signs; `previous_keys` only verify.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    #[serde(default)]
    pub key: Option<SecretString>,
    #[serde(default)]
    pub previous_keys: Vec<SecretString>,
}

// Secrets are never written back out.
impl Serialize for SigningConfig {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("SigningConfig", 2)?;
        s.serialize_field("key", &self.key.as_ref().map(|_| "***"))?;
        s.serialize_field("previous_keys", &vec!["***"; self.previous_keys.len()])?;
        s.end()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Store by-type results read from storage on a cache miss.
    #[serde(default)]
    pub populate_on_miss: bool,
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            populate_on_miss: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrityConfig {
    /// Report a single record that fails verification as not found instead
    /// of as corrupted.
    #[serde(default = "default_true")]
    pub report_corruption_as_not_found: bool,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            report_corruption_as_not_found: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReaperConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_reaper_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_dead_after_secs")]
    pub dead_after_secs: u64,
}

impl ReaperConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn dead_after(&self) -> Duration {
        Duration::from_secs(self.dead_after_secs)
    }

    /// # Errors
    /// Returns an error if `interval_secs` is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.interval_secs > 0, "reaper.interval_secs must be at least 1");
        Ok(())
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_reaper_interval_secs(),
            dead_after_secs: default_dead_after_secs(),
        }
    }
}

fn default_dsn() -> String {
    "sqlite::memory:".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_reaper_interval_secs() -> u64 {
    60
}

fn default_dead_after_secs() -> u64 {
    300
}

impl ServicesRegistryConfig {
    /// Layered load: defaults, then the YAML file if given, then
    /// `SERVICES_REGISTRY__*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a source cannot be read or the merged result does
    /// not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path).extract().map_err(Box::new)
    }

    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = ServicesRegistryConfig::default();
        assert_eq!(cfg.database.dsn, "sqlite::memory:");
        assert!(cfg.database.run_migrations);
        assert!(cfg.signing.key.is_none());
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.cache.ttl(), Duration::from_secs(30));
        assert!(!cfg.cache.populate_on_miss);
        assert!(cfg.integrity.report_corruption_as_not_found);
        assert!(!cfg.reaper.enabled);
        assert_eq!(cfg.reaper.dead_after(), Duration::from_secs(300));
    }

    #[test]
    fn zero_reaper_interval_is_rejected() {
        let mut reaper = ReaperConfig::default();
        assert!(reaper.validate().is_ok());

        reaper.interval_secs = 0;
        let err = reaper.validate().unwrap_err();
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn yaml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            concat!(
                "signing:\n  key: \"{}\"\n",
                "cache:\n  ttl_secs: 5\n",
                "integrity:\n  report_corruption_as_not_found: false\n",
            ),
            "ab".repeat(32)
        )
        .unwrap();

        let cfg = ServicesRegistryConfig::figment(Some(file.path()))
            .extract::<ServicesRegistryConfig>()
            .unwrap();
        assert_eq!(cfg.cache.ttl_secs, 5);
        assert!(cfg.cache.enabled);
        assert!(!cfg.integrity.report_corruption_as_not_found);
        assert_eq!(
            cfg.signing.key.as_ref().unwrap().expose_secret(),
            "ab".repeat(32)
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let figment = Figment::new().merge(Serialized::defaults(serde_json::json!({
            "cache": { "ttl": 5 }
        })));
        assert!(figment.extract::<ServicesRegistryConfig>().is_err());
    }

    #[test]
    fn signing_keys_are_redacted_when_serialized() {
        let cfg = SigningConfig {
            key: Some(SecretString::from("00".repeat(32))),
            previous_keys: vec![SecretString::from("11".repeat(32))],
        };
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["key"], "***");
        assert_eq!(json["previous_keys"][0], "***");
    }
}
