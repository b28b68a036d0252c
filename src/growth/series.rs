//! Series Extraction
//!
//! Turns one entity's raw records into a sorted (episode, value) series for
//! one metric. Correction rules are baked into the series, so the absolute
//! and the trend statistics both see corrected values.

use serde::Serialize;
use std::collections::BTreeMap;

use super::metric::{Aggregation, MetricDefinition};
use super::record::{EntityProfile, RawRecord};

/// Parallel arrays, time steps strictly increasing, never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    time_steps: Vec<u32>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// `None` when no points survive; an empty series is never built.
    pub fn from_points(points: BTreeMap<u32, f64>) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let (time_steps, values) = points.into_iter().unzip();
        Some(Self { time_steps, values })
    }

    pub fn time_steps(&self) -> &[u32] {
        &self.time_steps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.time_steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_steps.is_empty()
    }

    /// Last observed episode.
    pub fn max_time_step(&self) -> Option<u32> {
        self.time_steps.last().copied()
    }

    /// Number of leading points with `time_step <= cutoff`.
    pub fn count_through(&self, cutoff: u32) -> usize {
        self.time_steps.partition_point(|t| *t <= cutoff)
    }
}

pub struct SeriesExtractor;

impl SeriesExtractor {
    /// Filter, correct, drop unusable rows, aggregate per episode, sort.
    pub fn extract(
        records: &[RawRecord],
        metric: &MetricDefinition,
        profile: Option<&EntityProfile>,
    ) -> Option<TimeSeries> {
        // (sum, count) per episode
        let mut buckets: BTreeMap<u32, (f64, usize)> = BTreeMap::new();

        for record in records.iter().filter(|r| metric.selects(r)) {
            let Some(step) = record.usable_time_step() else {
                continue;
            };
            let mut value = record.value;
            if let Some(rule) = &metric.correction {
                if rule.applies_to(record, profile) {
                    value *= rule.factor;
                }
            }
            let slot = buckets.entry(step).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }

        let points = buckets
            .into_iter()
            .map(|(step, (sum, count))| {
                let value = match metric.aggregation {
                    Aggregation::Sum => sum,
                    Aggregation::Mean => sum / count as f64,
                };
                (step, value)
            })
            .collect();

        TimeSeries::from_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::metric::{MetricRegistry, AUDIENCE_KEY, MEDIA_TVING_VOD, NETFLIX_FLAG};

    fn rating() -> MetricDefinition {
        MetricDefinition::new("Rating", "rating", Aggregation::Mean)
    }

    #[test]
    fn test_mean_and_sum_aggregation() {
        let records = vec![
            RawRecord::new("a", "rating", 2, 4.0),
            RawRecord::new("a", "rating", 1, 1.0),
            RawRecord::new("a", "rating", 1, 3.0),
        ];
        let mean = SeriesExtractor::extract(&records, &rating(), None).unwrap();
        assert_eq!(mean.time_steps(), &[1, 2]);
        assert_eq!(mean.values(), &[2.0, 4.0]);

        let sum_def = MetricDefinition::new("Total", "rating", Aggregation::Sum);
        let sum = SeriesExtractor::extract(&records, &sum_def, None).unwrap();
        assert_eq!(sum.values(), &[4.0, 4.0]);
    }

    #[test]
    fn test_zero_and_missing_steps_dropped() {
        let mut no_step = RawRecord::new("d", "rating", 3, 9.0);
        no_step.time_step = None;
        let records = vec![
            RawRecord::new("d", "rating", 1, 5.0),
            RawRecord::new("d", "rating", 2, 0.0),
            RawRecord::new("d", "rating", 0, 7.0),
            no_step,
        ];
        let series = SeriesExtractor::extract(&records, &rating(), None).unwrap();
        assert_eq!(series.time_steps(), &[1]);
        assert_eq!(series.values(), &[5.0]);
    }

    #[test]
    fn test_no_matching_records_is_none() {
        let records = vec![RawRecord::new("a", "other", 1, 1.0)];
        assert!(SeriesExtractor::extract(&records, &rating(), None).is_none());
        assert!(SeriesExtractor::extract(&[], &rating(), None).is_none());
    }

    #[test]
    fn test_correction_only_for_flagged_entity() {
        let registry = MetricRegistry::broadcast();
        let vod = registry.get("TVING VOD").unwrap();
        let records = vec![
            RawRecord::new("n", AUDIENCE_KEY, 1, 100.0).with_media(MEDIA_TVING_VOD),
            RawRecord::new("n", AUDIENCE_KEY, 2, 200.0).with_media(MEDIA_TVING_VOD),
        ];
        let flagged = EntityProfile::default().with_flag(NETFLIX_FLAG);

        let plain = SeriesExtractor::extract(&records, vod, None).unwrap();
        let corrected = SeriesExtractor::extract(&records, vod, Some(&flagged)).unwrap();
        assert_eq!(plain.values(), &[100.0, 200.0]);
        assert_eq!(corrected.values(), &[140.0, 280.0]);
    }

    #[test]
    fn test_count_through() {
        let records = vec![
            RawRecord::new("a", "rating", 1, 1.0),
            RawRecord::new("a", "rating", 3, 1.0),
            RawRecord::new("a", "rating", 6, 1.0),
        ];
        let series = SeriesExtractor::extract(&records, &rating(), None).unwrap();
        assert_eq!(series.count_through(0), 0);
        assert_eq!(series.count_through(3), 2);
        assert_eq!(series.count_through(5), 2);
        assert_eq!(series.count_through(100), 3);
        assert_eq!(series.max_time_step(), Some(6));
    }
}
