//! Grade Evolution
//!
//! One entity's composite grade as the cutoff moves toward its own last
//! episode. Each point re-grades the whole population at that cutoff.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::cache::SeriesCache;
use super::composite::{CompositeScorer, GradeTable};
use super::grade::{AbsoluteGrade, TrendGrade};
use super::metric::MetricRegistry;
use super::stats::Cutoff;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionPoint {
    pub cutoff: Cutoff,
    pub composite_absolute: AbsoluteGrade,
    pub composite_trend: Option<TrendGrade>,
    /// S = 5 .. D = 1
    pub numeric_rank: u8,
}

impl EvolutionPoint {
    pub fn label(&self) -> String {
        match self.composite_trend {
            Some(t) => format!("{}{}", self.composite_absolute, t),
            None => self.composite_absolute.to_string(),
        }
    }
}

pub struct EvolutionTracker;

impl EvolutionTracker {
    /// Last episode observed for `entity` across the registry's metrics.
    pub fn horizon(entity: &str, registry: &MetricRegistry, cache: &SeriesCache) -> Option<u32> {
        registry
            .metrics()
            .iter()
            .filter_map(|m| cache.get(entity, m).and_then(|s| s.max_time_step()))
            .max()
    }

    /// Sorted, deduplicated cutoffs not past the entity's horizon.
    pub fn reachable(cutoffs: &[Cutoff], horizon: Option<u32>) -> Vec<Cutoff> {
        let Some(horizon) = horizon else {
            return Vec::new();
        };
        let mut out: Vec<Cutoff> = cutoffs.iter().copied().filter(|c| c.get() <= horizon).collect();
        out.sort();
        out.dedup();
        out
    }

    /// Grade tables for each cutoff, in the given order.
    pub fn tables(
        population: &[String],
        registry: &MetricRegistry,
        cache: &SeriesCache,
        cutoffs: &[Cutoff],
        parallel: bool,
    ) -> Vec<GradeTable> {
        if parallel {
            cutoffs
                .par_iter()
                .map(|c| CompositeScorer::score(population, registry, cache, *c))
                .collect()
        } else {
            cutoffs
                .iter()
                .map(|c| CompositeScorer::score(population, registry, cache, *c))
                .collect()
        }
    }

    /// Focal entity's point in a table; `None` without a composite grade.
    pub fn point(table: &GradeTable, focal: &str) -> Option<EvolutionPoint> {
        let row = table.row(focal)?;
        let absolute = row.composite_absolute?;
        Some(EvolutionPoint {
            cutoff: table.cutoff,
            composite_absolute: absolute,
            composite_trend: row.composite_trend,
            numeric_rank: absolute.score(),
        })
    }

    pub fn track(
        focal: &str,
        population: &[String],
        registry: &MetricRegistry,
        cache: &SeriesCache,
        cutoffs: &[Cutoff],
        parallel: bool,
    ) -> Vec<EvolutionPoint> {
        let horizon = Self::horizon(focal, registry, cache);
        let reachable = Self::reachable(cutoffs, horizon);
        debug!(
            "Tracking {} over {} of {} cutoffs (horizon {:?})",
            focal,
            reachable.len(),
            cutoffs.len(),
            horizon
        );

        Self::tables(population, registry, cache, &reachable, parallel)
            .iter()
            .filter_map(|table| Self::point(table, focal))
            .collect()
    }
}
