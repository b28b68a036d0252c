//! Metric Definition Registry
//!
//! Static description of every tracked metric. Resolved once when the
//! registry is built; the extractor never re-parses metric names per call.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use super::record::{EntityProfile, RawRecord};
use crate::error::{GradingError, Result};

/// Household rating source key.
pub const HOUSEHOLD_RATING_KEY: &str = "H시청률";
/// Target-demo rating source key.
pub const TARGET_RATING_KEY: &str = "T시청률";
/// Streaming audience source key.
pub const AUDIENCE_KEY: &str = "시청인구";
/// Digital view count source key.
pub const VIEWS_KEY: &str = "조회수";
/// Buzz score source key.
pub const BUZZ_KEY: &str = "F_Score";

pub const MEDIA_TVING_LIVE: &str = "TVING LIVE";
pub const MEDIA_TVING_VOD: &str = "TVING VOD";
pub const MEDIA_YOUTUBE: &str = "유튜브";

/// Entity flag for titles co-released on Netflix.
pub const NETFLIX_FLAG: &str = "netflix";
/// VOD uplift applied to Netflix co-releases.
pub const NETFLIX_VOD_FACTOR: f64 = 1.4;

/// How duplicate records at one time step collapse into one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Rate-like metrics (ratings)
    Mean,
    /// Volume-like metrics (viewers, views)
    Sum,
}

/// Fixed multiplier applied to records of flagged entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRule {
    /// Profile flag the entity must carry
    pub entity_flag: String,
    /// Restrict to one media; `None` matches every media
    #[serde(default)]
    pub media: Option<String>,
    pub factor: f64,
}

impl CorrectionRule {
    pub fn applies_to(&self, record: &RawRecord, profile: Option<&EntityProfile>) -> bool {
        let flagged = profile.map(|p| p.has_flag(&self.entity_flag)).unwrap_or(false);
        let media_ok = match &self.media {
            Some(m) => record.media.as_deref() == Some(m.as_str()),
            None => true,
        };
        flagged && media_ok
    }
}

/// Records of `media` only count when their detail attribute is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailGate {
    pub media: String,
    pub allowed: BTreeSet<String>,
}

impl DetailGate {
    pub fn admits(&self, record: &RawRecord) -> bool {
        if record.media.as_deref() != Some(self.media.as_str()) {
            return true;
        }
        record
            .detail
            .as_deref()
            .map(|d| self.allowed.contains(d))
            .unwrap_or(false)
    }
}

fn default_true() -> bool {
    true
}

/// One tracked metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub display_name: String,
    pub source_key: String,
    #[serde(default)]
    pub media_filter: Option<BTreeSet<String>>,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub correction: Option<CorrectionRule>,
    #[serde(default)]
    pub detail_gate: Option<DetailGate>,
    /// Whether the metric produces a slope at all
    #[serde(default = "default_true")]
    pub trend: bool,
}

impl MetricDefinition {
    pub fn new(display_name: &str, source_key: &str, aggregation: Aggregation) -> Self {
        Self {
            display_name: display_name.to_string(),
            source_key: source_key.to_string(),
            media_filter: None,
            aggregation,
            correction: None,
            detail_gate: None,
            trend: true,
        }
    }

    pub fn with_media<I, S>(mut self, media: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.media_filter = Some(media.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_correction(mut self, entity_flag: &str, media: Option<&str>, factor: f64) -> Self {
        self.correction = Some(CorrectionRule {
            entity_flag: entity_flag.to_string(),
            media: media.map(str::to_string),
            factor,
        });
        self
    }

    pub fn with_detail_gate<I, S>(mut self, media: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detail_gate = Some(DetailGate {
            media: media.to_string(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn without_trend(mut self) -> Self {
        self.trend = false;
        self
    }

    /// Metric key, media filter and detail gate all admit the record.
    pub fn selects(&self, record: &RawRecord) -> bool {
        if record.metric_key != self.source_key {
            return false;
        }
        if let Some(filter) = &self.media_filter {
            match record.media.as_deref() {
                Some(m) if filter.contains(m) => {}
                _ => return false,
            }
        }
        self.detail_gate.as_ref().map(|g| g.admits(record)).unwrap_or(true)
    }

    fn validate(&self) -> Result<()> {
        if self.display_name.trim().is_empty() {
            return Err(GradingError::EmptyDisplayName);
        }
        if self.source_key.trim().is_empty() {
            return Err(GradingError::EmptySourceKey { metric: self.display_name.clone() });
        }
        if matches!(&self.media_filter, Some(f) if f.is_empty()) {
            return Err(GradingError::EmptyMediaFilter { metric: self.display_name.clone() });
        }
        if let Some(rule) = &self.correction {
            if !rule.factor.is_finite() || rule.factor <= 0.0 {
                return Err(GradingError::InvalidCorrectionFactor {
                    metric: self.display_name.clone(),
                    factor: rule.factor,
                });
            }
        }
        if matches!(&self.detail_gate, Some(g) if g.allowed.is_empty()) {
            return Err(GradingError::EmptyDetailGate { metric: self.display_name.clone() });
        }
        Ok(())
    }
}

/// Validated, ordered list of metrics combined into one composite grade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRegistry {
    metrics: Vec<MetricDefinition>,
}

impl MetricRegistry {
    /// Fails fast on any malformed definition.
    pub fn new(metrics: Vec<MetricDefinition>) -> Result<Self> {
        if metrics.is_empty() {
            return Err(GradingError::EmptyRegistry);
        }
        let mut seen = HashSet::new();
        for def in &metrics {
            def.validate()?;
            if !seen.insert(def.display_name.as_str()) {
                return Err(GradingError::DuplicateMetric(def.display_name.clone()));
            }
        }
        debug!("Metric registry built with {} metrics", metrics.len());
        Ok(Self { metrics })
    }

    /// Ratings and TVING audience, with the Netflix VOD uplift.
    pub fn broadcast() -> Self {
        Self {
            metrics: vec![
                MetricDefinition::new("Household Rating", HOUSEHOLD_RATING_KEY, Aggregation::Mean),
                MetricDefinition::new("Target Rating", TARGET_RATING_KEY, Aggregation::Mean),
                MetricDefinition::new("TVING LIVE", AUDIENCE_KEY, Aggregation::Sum)
                    .with_media([MEDIA_TVING_LIVE]),
                MetricDefinition::new("TVING VOD", AUDIENCE_KEY, Aggregation::Sum)
                    .with_media([MEDIA_TVING_VOD])
                    .with_correction(NETFLIX_FLAG, Some(MEDIA_TVING_VOD), NETFLIX_VOD_FACTOR),
            ],
        }
    }

    /// Digital views and buzz score.
    pub fn digital() -> Self {
        Self {
            metrics: vec![
                MetricDefinition::new("Views", VIEWS_KEY, Aggregation::Sum)
                    .with_detail_gate(MEDIA_YOUTUBE, ["PGC", "UGC"]),
                MetricDefinition::new("Buzz", BUZZ_KEY, Aggregation::Mean),
            ],
        }
    }

    pub fn get(&self, display_name: &str) -> Result<&MetricDefinition> {
        self.metrics
            .iter()
            .find(|m| m.display_name == display_name)
            .ok_or_else(|| GradingError::UnknownMetric(display_name.to_string()))
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.display_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
