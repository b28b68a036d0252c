//! Growth Configuration
//!
//! Cutoff choices, the active cutoff and the metric registry, loadable from
//! YAML/JSON files or `GROWTH_*` environment variables.

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{GradingError, Result};
use crate::growth::{Cutoff, MetricDefinition, MetricRegistry};

/// Round episode cutoffs shown on the evolution chart.
pub const DEFAULT_CUTOFFS: [u32; 8] = [2, 4, 6, 8, 10, 12, 14, 16];
pub const DEFAULT_ACTIVE_CUTOFF: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryPreset {
    /// Ratings and TVING audience
    #[default]
    Broadcast,
    /// Views and buzz
    Digital,
}

impl std::str::FromStr for RegistryPreset {
    type Err = GradingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcast" => Ok(RegistryPreset::Broadcast),
            "digital" => Ok(RegistryPreset::Digital),
            other => Err(GradingError::Config(format!("unknown preset '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    pub cutoff_choices: Vec<u32>,
    pub active_cutoff: u32,
    /// Grade cutoffs on the rayon pool
    pub parallel: bool,
    pub preset: RegistryPreset,
    /// Custom registry; overrides `preset` when set
    pub metrics: Option<Vec<MetricDefinition>>,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            cutoff_choices: DEFAULT_CUTOFFS.to_vec(),
            active_cutoff: DEFAULT_ACTIVE_CUTOFF,
            parallel: false,
            preset: RegistryPreset::Broadcast,
            metrics: None,
        }
    }
}

impl GrowthConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// `.json` is parsed as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> AnyResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read growth config {}", path.display()))?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
        .with_context(|| format!("Invalid growth config {}", path.display()))?;
        info!("Loaded growth config from {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by `.env` and `GROWTH_*` variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GROWTH_ACTIVE_CUTOFF") {
            config.active_cutoff = parse_u32("GROWTH_ACTIVE_CUTOFF", &v)?;
        }
        if let Ok(v) = std::env::var("GROWTH_CUTOFFS") {
            config.cutoff_choices = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_u32("GROWTH_CUTOFFS", s))
                .collect::<Result<Vec<_>>>()?;
        }
        if let Ok(v) = std::env::var("GROWTH_PARALLEL") {
            config.parallel = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("GROWTH_PRESET") {
            config.preset = v.parse()?;
        }

        config.validate()?;
        debug!("Growth config from environment: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cutoff_choices.is_empty() {
            return Err(GradingError::Config("cutoff_choices is empty".to_string()));
        }
        for c in &self.cutoff_choices {
            Cutoff::new(*c as i64)?;
        }
        Cutoff::new(self.active_cutoff as i64)?;
        if let Some(metrics) = &self.metrics {
            MetricRegistry::new(metrics.clone())?;
        }
        Ok(())
    }

    pub fn registry(&self) -> Result<MetricRegistry> {
        match &self.metrics {
            Some(metrics) => MetricRegistry::new(metrics.clone()),
            None => Ok(match self.preset {
                RegistryPreset::Broadcast => MetricRegistry::broadcast(),
                RegistryPreset::Digital => MetricRegistry::digital(),
            }),
        }
    }

    pub fn cutoffs(&self) -> Result<Vec<Cutoff>> {
        self.cutoff_choices.iter().map(|c| Cutoff::new(*c as i64)).collect()
    }

    pub fn active(&self) -> Result<Cutoff> {
        Cutoff::new(self.active_cutoff as i64)
    }
}

fn parse_u32(var: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| GradingError::Config(format!("{} is not a number: '{}'", var, value)))
}
