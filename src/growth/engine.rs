//! Growth Engine
//!
//! One engine per (record set, metric registry). Broadcast and digital
//! grading are two registries over the same engine code.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::cache::{CacheStats, SeriesCache};
use super::composite::{CompositeScorer, GradeTable};
use super::evolution::{EvolutionPoint, EvolutionTracker};
use super::metric::{MetricDefinition, MetricRegistry};
use super::positioning::PositioningMap;
use super::record::RecordSet;
use super::stats::{Cutoff, StatResult, StatisticsComputer};
use crate::config::GrowthConfig;
use crate::error::{GradingError, Result};

/// Ordered set of entities graded together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Population {
    entities: Vec<String>,
}

impl Population {
    /// Every entity in the record set, sorted.
    pub fn all(records: &RecordSet) -> Self {
        Self { entities: records.entities() }
    }

    /// Entities sharing the focal entity's slot, focal included.
    /// Without a slot on the focal entity, every entity is compared.
    pub fn same_slot(records: &RecordSet, focal: &str) -> Result<Self> {
        if !records.contains(focal) {
            return Err(GradingError::UnknownEntity(focal.to_string()));
        }
        let Some(slot) = records.profile(focal).and_then(|p| p.slot.clone()) else {
            warn!("{} has no slot, comparing against all entities", focal);
            return Ok(Self::all(records));
        };
        let mut entities: Vec<String> = records
            .entities()
            .into_iter()
            .filter(|e| records.profile(e).and_then(|p| p.slot.as_deref()) == Some(slot.as_str()))
            .collect();
        if !entities.iter().any(|e| e == focal) {
            entities.push(focal.to_string());
        }
        Ok(Self { entities })
    }

    /// Explicit list; duplicates after the first occurrence are dropped.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let entities = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self { entities }
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.iter().any(|e| e == entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Everything the growth page renders for one focal entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthReport {
    pub focal: String,
    pub active: GradeTable,
    pub evolution: Vec<EvolutionPoint>,
    pub positioning: PositioningMap,
}

pub struct GrowthEngine {
    registry: MetricRegistry,
    cache: SeriesCache,
    parallel: bool,
}

impl GrowthEngine {
    pub fn new(records: Arc<RecordSet>, registry: MetricRegistry) -> Self {
        Self {
            registry,
            cache: SeriesCache::new(records),
            parallel: false,
        }
    }

    pub fn from_config(records: Arc<RecordSet>, config: &GrowthConfig) -> Result<Self> {
        config.validate()?;
        let engine = Self::new(records, config.registry()?).with_parallel(config.parallel);
        Ok(engine)
    }

    /// Same semantics as `new`, but every lookup re-extracts its series.
    pub fn uncached(records: Arc<RecordSet>, registry: MetricRegistry) -> Self {
        Self {
            registry,
            cache: SeriesCache::uncached(records),
            parallel: false,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn records(&self) -> &RecordSet {
        self.cache.records()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn population(&self) -> Population {
        Population::all(self.records())
    }

    pub fn comparison_group(&self, focal: &str) -> Result<Population> {
        Population::same_slot(self.records(), focal)
    }

    pub fn stat(&self, entity: &str, metric: &str, cutoff: Cutoff) -> Result<StatResult> {
        let def: &MetricDefinition = self.registry.get(metric)?;
        let series = self.cache.get(entity, def);
        Ok(StatisticsComputer::compute(series.as_deref(), cutoff, def.trend))
    }

    /// Grade table for the whole population at one cutoff.
    pub fn evaluate(&self, population: &Population, cutoff: Cutoff) -> GradeTable {
        CompositeScorer::score(population.entities(), &self.registry, &self.cache, cutoff)
    }

    pub fn positioning(&self, population: &Population, cutoff: Cutoff) -> PositioningMap {
        PositioningMap::build(&self.evaluate(population, cutoff))
    }

    pub fn evolution(&self, population: &Population, focal: &str, cutoffs: &[Cutoff]) -> Vec<EvolutionPoint> {
        EvolutionTracker::track(
            focal,
            population.entities(),
            &self.registry,
            &self.cache,
            cutoffs,
            self.parallel,
        )
    }

    /// Active table, evolution and positioning map, grading each needed
    /// cutoff once.
    pub fn report(
        &self,
        population: &Population,
        focal: &str,
        active: Cutoff,
        cutoff_choices: &[Cutoff],
    ) -> Result<GrowthReport> {
        if !population.contains(focal) {
            return Err(GradingError::UnknownEntity(focal.to_string()));
        }

        let horizon = EvolutionTracker::horizon(focal, &self.registry, &self.cache);
        let reachable = EvolutionTracker::reachable(cutoff_choices, horizon);

        let mut needed = reachable.clone();
        needed.push(active);
        needed.sort();
        needed.dedup();

        let tables = EvolutionTracker::tables(
            population.entities(),
            &self.registry,
            &self.cache,
            &needed,
            self.parallel,
        );

        let mut active_table = None;
        let mut evolution = Vec::with_capacity(reachable.len());
        for table in tables {
            if reachable.contains(&table.cutoff) {
                if let Some(point) = EvolutionTracker::point(&table, focal) {
                    evolution.push(point);
                }
            }
            if table.cutoff == active {
                active_table = Some(table);
            }
        }
        let active_table = active_table.unwrap_or_else(|| self.evaluate(population, active));
        let positioning = PositioningMap::build(&active_table);

        info!(
            "Growth report for {}: {} entities at cutoff {}, {} evolution points",
            focal,
            population.len(),
            active,
            evolution.len()
        );

        Ok(GrowthReport {
            focal: focal.to_string(),
            active: active_table,
            evolution,
            positioning,
        })
    }
}
