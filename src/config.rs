use anyhow::Result;
use bundle_rules_core::RuleBounds;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlerConfig {
    /// Bounds and switches the rule catalogue is bootstrapped with
    #[serde(default)]
    pub rules: RuleBounds,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Record admission checks in the process-wide metrics
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            rules: RuleBounds::default(),
            logging: LoggingConfig::default(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub with_target: bool,
}

fn default_filter() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            with_target: false,
        }
    }
}

impl BundlerConfig {
    /// Load from a YAML, TOML or JSON file, picked by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        let config: BundlerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: BundlerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.rules.validate()?;

        if self.logging.filter.trim().is_empty() {
            anyhow::bail!("Logging filter must not be empty");
        }
        if let Err(e) = EnvFilter::try_new(&self.logging.filter) {
            anyhow::bail!("Invalid logging filter '{}': {}", self.logging.filter, e);
        }
        Ok(())
    }
}
