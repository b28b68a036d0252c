//! Composite Scoring
//!
//! Grades every metric across the population at one cutoff, then folds the
//! per-metric standings into one absolute and one trend composite grade.
//! Only standings enter the composite, so metric units never matter.

use serde::Serialize;

use super::cache::SeriesCache;
use super::grade::{combined_grade, AbsoluteGrade, Direction, QuantileGrader, Standing, TrendGrade};
use super::metric::MetricRegistry;
use super::stats::{Cutoff, StatResult, StatisticsComputer};

/// One metric's numbers and grades for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricGrade {
    pub metric: String,
    pub absolute: Option<f64>,
    pub slope: Option<f64>,
    pub absolute_grade: Option<AbsoluteGrade>,
    pub trend_grade: Option<TrendGrade>,
    /// e.g. `A+1`
    pub grade: Option<String>,
}

/// One entity at one cutoff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRow {
    pub entity: String,
    pub cutoff: Cutoff,
    pub metrics: Vec<MetricGrade>,
    pub mean_absolute_percentile: Option<f64>,
    pub mean_trend_percentile: Option<f64>,
    pub composite_absolute: Option<AbsoluteGrade>,
    pub composite_trend: Option<TrendGrade>,
    pub composite_grade: Option<String>,
}

impl GradeRow {
    pub fn metric(&self, name: &str) -> Option<&MetricGrade> {
        self.metrics.iter().find(|m| m.metric == name)
    }
}

/// Every entity of a population at one cutoff, in population order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeTable {
    pub cutoff: Cutoff,
    pub rows: Vec<GradeRow>,
}

impl GradeTable {
    pub fn row(&self, entity: &str) -> Option<&GradeRow> {
        self.rows.iter().find(|r| r.entity == entity)
    }

    /// Best composite first; ungraded rows last, ties by entity id.
    pub fn ranked(&self) -> Vec<&GradeRow> {
        let mut rows: Vec<&GradeRow> = self.rows.iter().collect();
        rows.sort_by_key(|r| {
            (
                r.composite_absolute.map(|g| g.index()).unwrap_or(usize::MAX),
                r.composite_trend.map(|g| g.index()).unwrap_or(usize::MAX),
                r.entity.clone(),
            )
        });
        rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct CompositeScorer;

impl CompositeScorer {
    /// Statistics for every (entity, metric) pair, `[entity][metric]`.
    pub fn collect_stats(
        population: &[String],
        registry: &MetricRegistry,
        cache: &SeriesCache,
        cutoff: Cutoff,
    ) -> Vec<Vec<StatResult>> {
        population
            .iter()
            .map(|entity| {
                registry
                    .metrics()
                    .iter()
                    .map(|metric| {
                        let series = cache.get(entity, metric);
                        StatisticsComputer::compute(series.as_deref(), cutoff, metric.trend)
                    })
                    .collect()
            })
            .collect()
    }

    /// Full grade table for one population at one cutoff.
    pub fn score(
        population: &[String],
        registry: &MetricRegistry,
        cache: &SeriesCache,
        cutoff: Cutoff,
    ) -> GradeTable {
        let stats = Self::collect_stats(population, registry, cache, cutoff);
        Self::score_stats(population, registry, &stats, cutoff)
    }

    /// Grades precomputed statistics laid out `[entity][metric]`: one row
    /// per population entity, in population order, each holding one
    /// `StatResult` per registry metric in registry order. Panics on any
    /// other shape.
    pub fn score_stats(
        population: &[String],
        registry: &MetricRegistry,
        stats: &[Vec<StatResult>],
        cutoff: Cutoff,
    ) -> GradeTable {
        let n_metrics = registry.len();
        assert!(
            stats.len() == population.len() && stats.iter().all(|row| row.len() == n_metrics),
            "stats must be {} entities x {} metrics",
            population.len(),
            n_metrics
        );
        let mut metric_rows: Vec<Vec<MetricGrade>> = population
            .iter()
            .enumerate()
            .map(|(e, _)| {
                registry
                    .metrics()
                    .iter()
                    .enumerate()
                    .map(|(m, def)| MetricGrade {
                        metric: def.display_name.clone(),
                        absolute: stats[e][m].absolute,
                        slope: stats[e][m].slope,
                        absolute_grade: None,
                        trend_grade: None,
                        grade: None,
                    })
                    .collect()
            })
            .collect();

        // Per-entity standings, accumulated metric by metric.
        let mut abs_standings: Vec<Vec<Standing>> = vec![Vec::with_capacity(n_metrics); population.len()];
        let mut trend_standings: Vec<Vec<Standing>> = vec![Vec::with_capacity(n_metrics); population.len()];

        for m in 0..n_metrics {
            let absolutes: Vec<Option<f64>> = stats.iter().map(|row| row[m].absolute).collect();
            let slopes: Vec<Option<f64>> = stats.iter().map(|row| row[m].slope).collect();

            let abs_ranks = QuantileGrader::rank(&absolutes, Direction::HigherIsBetter);
            let slope_ranks = QuantileGrader::rank(&slopes, Direction::HigherIsBetter);

            for e in 0..population.len() {
                let cell = &mut metric_rows[e][m];
                if let Some(pos) = abs_ranks[e] {
                    cell.absolute_grade = Some(AbsoluteGrade::LABELS[pos.bucket()]);
                    abs_standings[e].push(pos.exact_standing());
                }
                if let Some(pos) = slope_ranks[e] {
                    cell.trend_grade = Some(TrendGrade::LABELS[pos.bucket()]);
                    trend_standings[e].push(pos.exact_standing());
                }
                cell.grade = combined_grade(cell.absolute_grade, cell.trend_grade);
            }
        }

        // Exact means, so equal averages tie instead of splitting on rounding.
        let mean_abs: Vec<Option<Standing>> = abs_standings.iter().map(|s| Standing::mean(s)).collect();
        let mean_trend: Vec<Option<Standing>> = trend_standings.iter().map(|s| Standing::mean(s)).collect();

        let composite_abs = regrade(&mean_abs, &AbsoluteGrade::LABELS);
        let composite_trend = regrade(&mean_trend, &TrendGrade::LABELS);

        let rows = population
            .iter()
            .zip(metric_rows)
            .enumerate()
            .map(|(e, (entity, metrics))| GradeRow {
                entity: entity.clone(),
                cutoff,
                metrics,
                mean_absolute_percentile: mean_abs[e].map(|v| v.as_f64() * 100.0),
                mean_trend_percentile: mean_trend[e].map(|v| v.as_f64() * 100.0),
                composite_absolute: composite_abs[e],
                composite_trend: composite_trend[e],
                composite_grade: combined_grade(composite_abs[e], composite_trend[e]),
            })
            .collect();

        GradeTable { cutoff, rows }
    }
}

/// Higher mean standing is better.
fn regrade<L: Copy>(means: &[Option<Standing>], labels: &[L; 5]) -> Vec<Option<L>> {
    QuantileGrader::rank_by(means, |a, b| b.cmp(a))
        .into_iter()
        .map(|pos| pos.map(|p| labels[p.bucket()]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::metric::{Aggregation, MetricDefinition};
    use crate::growth::record::{RawRecord, RecordSet};
    use std::sync::Arc;

    fn stat(absolute: Option<f64>, slope: Option<f64>) -> StatResult {
        StatResult { absolute, slope }
    }

    fn two_metrics() -> MetricRegistry {
        MetricRegistry::new(vec![
            MetricDefinition::new("Rating", "rating", Aggregation::Mean),
            MetricDefinition::new("Views", "views", Aggregation::Sum),
        ])
        .unwrap()
    }

    fn names(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_composite_from_standings() {
        let pop = names(&["a", "b", "c"]);
        let stats = vec![
            vec![stat(Some(3.0), Some(1.0)), stat(Some(100.0), Some(-5.0))],
            vec![stat(Some(2.0), Some(2.0)), stat(Some(300.0), Some(0.0))],
            vec![stat(Some(1.0), Some(3.0)), stat(Some(200.0), Some(5.0))],
        ];
        let table = CompositeScorer::score_stats(&pop, &two_metrics(), &stats, Cutoff::new(4).unwrap());

        // a: standings 1.0 and 0.0 -> 0.5; b: 0.5 and 1.0 -> 0.75; c: 0.0 and 0.5 -> 0.25
        let a = table.row("a").unwrap();
        assert_eq!(a.mean_absolute_percentile, Some(50.0));
        assert_eq!(table.row("b").unwrap().composite_absolute, Some(AbsoluteGrade::S));
        assert_eq!(a.composite_absolute, Some(AbsoluteGrade::B));
        assert_eq!(table.row("c").unwrap().composite_absolute, Some(AbsoluteGrade::D));

        // trends: a 0.0/0.0, b 0.5/0.5, c 1.0/1.0
        assert_eq!(table.row("c").unwrap().composite_grade.as_deref(), Some("D+2"));
        assert_eq!(a.composite_trend, Some(TrendGrade::Down2));
        assert_eq!(a.metric("Rating").unwrap().grade.as_deref(), Some("S-2"));
    }

    #[test]
    fn test_missing_metric_excluded_from_average() {
        let pop = names(&["a", "b"]);
        let stats = vec![
            vec![stat(Some(5.0), None), stat(None, None)],
            vec![stat(Some(1.0), None), stat(Some(10.0), None)],
        ];
        let table = CompositeScorer::score_stats(&pop, &two_metrics(), &stats, Cutoff::new(2).unwrap());
        let a = table.row("a").unwrap();
        // a only has Rating, where it is best
        assert_eq!(a.mean_absolute_percentile, Some(100.0));
        assert_eq!(a.mean_trend_percentile, None);
        assert_eq!(a.composite_trend, None);
        assert_eq!(a.composite_grade.as_deref(), Some("S"));
        assert_eq!(a.metric("Views").unwrap().grade, None);
        // b: 0.0 on Rating, 1.0 on Views
        assert_eq!(table.row("b").unwrap().mean_absolute_percentile, Some(50.0));
    }

    #[test]
    fn test_entity_without_data_has_no_grade() {
        let pop = names(&["a", "ghost"]);
        let stats = vec![
            vec![stat(Some(5.0), Some(1.0)), stat(Some(1.0), Some(1.0))],
            vec![StatResult::EMPTY, StatResult::EMPTY],
        ];
        let table = CompositeScorer::score_stats(&pop, &two_metrics(), &stats, Cutoff::new(2).unwrap());
        let ghost = table.row("ghost").unwrap();
        assert_eq!(ghost.composite_absolute, None);
        assert_eq!(ghost.composite_grade, None);
        assert_eq!(table.ranked().last().unwrap().entity, "ghost");
    }

    fn three_metrics() -> MetricRegistry {
        MetricRegistry::new(vec![
            MetricDefinition::new("Rating", "rating", Aggregation::Mean),
            MetricDefinition::new("Views", "views", Aggregation::Sum),
            MetricDefinition::new("Buzz", "buzz", Aggregation::Mean),
        ])
        .unwrap()
    }

    #[test]
    fn test_equal_mean_standings_tie() {
        // Orders: e0 > e1 > e2 > e3 twice, then e2 > e0 > e1 > e3.
        // e1 = (2/3 + 2/3 + 1/3) / 3 and e2 = (1/3 + 1/3 + 1) / 3, both 5/9.
        let pop = names(&["e0", "e1", "e2", "e3"]);
        let values = [[4.0, 4.0, 3.0], [3.0, 3.0, 2.0], [2.0, 2.0, 4.0], [1.0, 1.0, 1.0]];
        let stats: Vec<Vec<StatResult>> = values
            .iter()
            .map(|row| row.iter().map(|v| stat(Some(*v), None)).collect())
            .collect();
        let table = CompositeScorer::score_stats(&pop, &three_metrics(), &stats, Cutoff::new(4).unwrap());

        let e1 = table.row("e1").unwrap();
        let e2 = table.row("e2").unwrap();
        assert_eq!(e1.composite_absolute, Some(AbsoluteGrade::B));
        assert_eq!(e2.composite_absolute, Some(AbsoluteGrade::B));
        assert_eq!(table.row("e0").unwrap().composite_absolute, Some(AbsoluteGrade::S));
        assert_eq!(table.row("e3").unwrap().composite_absolute, Some(AbsoluteGrade::D));
        assert_eq!(e1.mean_absolute_percentile, e2.mean_absolute_percentile);
    }

    #[test]
    #[should_panic(expected = "stats must be")]
    fn test_score_stats_rejects_wrong_shape() {
        let pop = names(&["a"]);
        let stats = vec![vec![StatResult::EMPTY, StatResult::EMPTY], vec![StatResult::EMPTY, StatResult::EMPTY]];
        CompositeScorer::score_stats(&pop, &two_metrics(), &stats, Cutoff::new(2).unwrap());
    }

    #[test]
    fn test_score_through_cache() {
        let records = RecordSet::new(vec![
            RawRecord::new("a", "rating", 1, 10.0),
            RawRecord::new("a", "rating", 2, 20.0),
            RawRecord::new("b", "rating", 1, 5.0),
            RawRecord::new("b", "rating", 2, 5.0),
            RawRecord::new("a", "views", 1, 1.0),
            RawRecord::new("b", "views", 1, 9.0),
        ]);
        let cache = SeriesCache::new(Arc::new(records));
        let table = CompositeScorer::score(&names(&["a", "b"]), &two_metrics(), &cache, Cutoff::new(2).unwrap());
        assert_eq!(table.len(), 2);
        let a = table.row("a").unwrap();
        assert_eq!(a.metric("Rating").unwrap().absolute, Some(15.0));
        assert_eq!(a.metric("Rating").unwrap().slope, Some(10.0));
        assert_eq!(a.metric("Views").unwrap().slope, None);
    }
}
