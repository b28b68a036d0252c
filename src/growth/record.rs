//! Raw Records
//!
//! The in-memory record set handed over by the data-loading side, indexed by
//! entity once so series extraction only scans one entity's rows.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;
use tracing::debug;

use super::metric::NETFLIX_FLAG;

/// One observation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub entity: String,
    pub metric_key: String,
    #[serde(default)]
    pub media: Option<String>,
    /// Secondary media attribute (e.g. PGC/UGC for YouTube)
    #[serde(default)]
    pub detail: Option<String>,
    /// 1-based episode number
    #[serde(default)]
    pub time_step: Option<i64>,
    pub value: f64,
}

impl RawRecord {
    pub fn new(entity: &str, metric_key: &str, time_step: i64, value: f64) -> Self {
        Self {
            entity: entity.to_string(),
            metric_key: metric_key.to_string(),
            media: None,
            detail: None,
            time_step: Some(time_step),
            value,
        }
    }

    pub fn with_media(mut self, media: &str) -> Self {
        self.media = Some(media.to_string());
        self
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    /// Positive episode number with a non-zero finite value.
    /// Zero marks an episode that has not aired yet.
    pub fn usable_time_step(&self) -> Option<u32> {
        let step = self.time_step.filter(|t| *t > 0)?;
        if self.value == 0.0 || !self.value.is_finite() {
            return None;
        }
        u32::try_from(step).ok()
    }
}

/// Spreadsheet row as exported by the document store: every cell is text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetRow {
    #[serde(rename = "IP")]
    pub entity: String,
    pub metric: String,
    #[serde(default, rename = "매체")]
    pub media: Option<String>,
    #[serde(default, rename = "세부속성1")]
    pub detail: Option<String>,
    #[serde(default, rename = "회차")]
    pub episode: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, rename = "편성")]
    pub slot: Option<String>,
    /// `1` when the title is co-released on Netflix
    #[serde(default, rename = "넷플릭스편성작")]
    pub netflix: Option<String>,
}

impl SheetRow {
    pub fn is_netflix(&self) -> bool {
        self.netflix.as_deref().map(parse_value) == Some(1.0)
    }
}

impl From<SheetRow> for RawRecord {
    fn from(row: SheetRow) -> Self {
        let clean = |s: Option<String>| {
            s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };
        RawRecord {
            entity: row.entity.trim().to_string(),
            metric_key: row.metric.trim().to_string(),
            time_step: row.episode.as_deref().and_then(parse_time_step),
            value: row.value.as_deref().map(parse_value).unwrap_or(0.0),
            media: clean(row.media),
            detail: clean(row.detail),
        }
    }
}

static EPISODE_DIGITS: OnceLock<Option<Regex>> = OnceLock::new();

/// First run of ASCII digits in an episode label: `"3회"` -> 3.
pub fn parse_time_step(label: &str) -> Option<i64> {
    let re = EPISODE_DIGITS.get_or_init(|| Regex::new(r"[0-9]+").ok()).as_ref()?;
    re.find(label)?.as_str().parse().ok()
}

/// Strips thousands separators and `%`; anything unparseable is 0.
pub fn parse_value(cell: &str) -> f64 {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',' && *c != '%').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Auxiliary per-entity attributes referenced by correction rules and
/// comparison groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityProfile {
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// Programming slot / channel
    #[serde(default)]
    pub slot: Option<String>,
}

impl EntityProfile {
    pub fn with_flag(mut self, flag: &str) -> Self {
        self.flags.insert(flag.to_string());
        self
    }

    pub fn with_slot(mut self, slot: &str) -> Self {
        self.slot = Some(slot.to_string());
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

/// Immutable record set for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    by_entity: BTreeMap<String, Vec<RawRecord>>,
    profiles: HashMap<String, EntityProfile>,
}

impl RecordSet {
    pub fn new(records: Vec<RawRecord>) -> Self {
        let total = records.len();
        let mut by_entity: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();
        for record in records {
            by_entity.entry(record.entity.clone()).or_default().push(record);
        }
        debug!("Indexed {} records across {} entities", total, by_entity.len());
        Self { by_entity, profiles: HashMap::new() }
    }

    /// Builds records and profiles from sheet rows: the most frequent slot,
    /// and the Netflix flag when any row of the entity carries it.
    pub fn from_sheet_rows(rows: Vec<SheetRow>) -> Self {
        let mut slots: HashMap<String, BTreeMap<String, usize>> = HashMap::new();
        let mut netflix: BTreeSet<String> = BTreeSet::new();
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if row.is_netflix() {
                netflix.insert(row.entity.trim().to_string());
            }
            if let Some(slot) = row.slot.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                *slots
                    .entry(row.entity.trim().to_string())
                    .or_default()
                    .entry(slot.to_string())
                    .or_insert(0) += 1;
            }
            records.push(RawRecord::from(row));
        }
        let mut set = Self::new(records);
        for (entity, counts) in slots {
            // Most frequent slot wins; BTreeMap order breaks ties alphabetically.
            let mut best: Option<(&String, usize)> = None;
            for (slot, count) in &counts {
                if best.map(|(_, c)| *count > c).unwrap_or(true) {
                    best = Some((slot, *count));
                }
            }
            if let Some((slot, _)) = best {
                set.profiles.entry(entity).or_default().slot = Some(slot.clone());
            }
        }
        for entity in netflix {
            set.profiles.entry(entity).or_default().flags.insert(NETFLIX_FLAG.to_string());
        }
        set
    }

    pub fn with_profile(mut self, entity: &str, profile: EntityProfile) -> Self {
        self.profiles.insert(entity.to_string(), profile);
        self
    }

    pub fn records_for(&self, entity: &str) -> &[RawRecord] {
        self.by_entity.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn profile(&self, entity: &str) -> Option<&EntityProfile> {
        self.profiles.get(entity)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.by_entity.contains_key(entity) || self.profiles.contains_key(entity)
    }

    /// Sorted entity ids.
    pub fn entities(&self) -> Vec<String> {
        let mut ids: BTreeSet<&String> = self.by_entity.keys().collect();
        ids.extend(self.profiles.keys());
        ids.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_entity.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}
