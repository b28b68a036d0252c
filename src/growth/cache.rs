//! Series Cache
//!
//! Memoizes extracted series per (entity, metric) for one record set.
//! A new record set needs a new cache; populations may change freely since
//! series do not depend on who else is being graded.
//!
//! Series are keyed by entity, display name and source key. Filters and
//! corrections are not part of the key, so a cache serves one registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::metric::MetricDefinition;
use super::record::RecordSet;
use super::series::{SeriesExtractor, TimeSeries};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    entity: String,
    metric: String,
    source_key: String,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Write-once-per-key cache, safe for concurrent readers.
pub struct SeriesCache {
    records: Arc<RecordSet>,
    series: RwLock<HashMap<SeriesKey, Option<Arc<TimeSeries>>>>,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SeriesCache {
    pub fn new(records: Arc<RecordSet>) -> Self {
        Self {
            records,
            series: RwLock::new(HashMap::new()),
            enabled: true,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Re-extracts on every call. Used to check cache transparency.
    pub fn uncached(records: Arc<RecordSet>) -> Self {
        Self { enabled: false, ..Self::new(records) }
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    pub fn get(&self, entity: &str, metric: &MetricDefinition) -> Option<Arc<TimeSeries>> {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return self.extract(entity, metric);
        }

        let key = SeriesKey {
            entity: entity.to_string(),
            metric: metric.display_name.clone(),
            source_key: metric.source_key.clone(),
        };

        if let Some(found) = self.read_map().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found.clone();
        }

        // Compute outside the lock, then publish. A racing writer may have
        // published first; both computed the same value, keep the first.
        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = self.extract(entity, metric);
        debug!(
            "Series cache miss: {} / {} ({} points)",
            entity,
            metric.display_name,
            computed.as_ref().map(|s| s.len()).unwrap_or(0)
        );
        let mut map = match self.series.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(key).or_insert(computed).clone()
    }

    /// Builds every (entity, metric) series up front.
    pub fn warm<'a, I>(&self, entities: I, metrics: &[MetricDefinition])
    where
        I: IntoIterator<Item = &'a String>,
    {
        for entity in entities {
            for metric in metrics {
                self.get(entity, metric);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.read_map().len(),
        }
    }

    pub fn clear(&self) {
        let mut map = match self.series.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.clear();
    }

    fn extract(&self, entity: &str, metric: &MetricDefinition) -> Option<Arc<TimeSeries>> {
        SeriesExtractor::extract(
            self.records.records_for(entity),
            metric,
            self.records.profile(entity),
        )
        .map(Arc::new)
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SeriesKey, Option<Arc<TimeSeries>>>> {
        match self.series.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::metric::Aggregation;
    use crate::growth::record::RawRecord;
    use rayon::prelude::*;

    fn fixture() -> (Arc<RecordSet>, MetricDefinition) {
        let records = RecordSet::new(vec![
            RawRecord::new("a", "rating", 1, 1.0),
            RawRecord::new("a", "rating", 2, 2.0),
            RawRecord::new("b", "rating", 1, 3.0),
        ]);
        (Arc::new(records), MetricDefinition::new("Rating", "rating", Aggregation::Mean))
    }

    #[test]
    fn test_second_get_is_a_hit() {
        let (records, metric) = fixture();
        let cache = SeriesCache::new(records);

        let first = cache.get("a", &metric);
        let second = cache.get("a", &metric);
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(first.as_ref().unwrap(), second.as_ref().unwrap()));

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_same_name_other_source_is_separate() {
        let (records, rating) = fixture();
        let cache = SeriesCache::new(records);
        let renamed = MetricDefinition::new("Rating", "views", Aggregation::Mean);

        assert!(cache.get("a", &rating).is_some());
        assert!(cache.get("a", &renamed).is_none());
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_missing_series_is_cached_as_none() {
        let (records, metric) = fixture();
        let cache = SeriesCache::new(records);
        assert!(cache.get("ghost", &metric).is_none());
        assert!(cache.get("ghost", &metric).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_uncached_mode_matches() {
        let (records, metric) = fixture();
        let cached = SeriesCache::new(records.clone());
        let uncached = SeriesCache::uncached(records);
        for entity in ["a", "b", "ghost"] {
            assert_eq!(cached.get(entity, &metric), uncached.get(entity, &metric));
        }
        uncached.get("a", &metric);
        assert_eq!(uncached.stats().hits, 0);
        assert_eq!(uncached.stats().entries, 0);
    }

    #[test]
    fn test_concurrent_readers() {
        let (records, metric) = fixture();
        let cache = SeriesCache::new(records);
        let lens: Vec<usize> = (0..64)
            .into_par_iter()
            .map(|i| {
                let entity = if i % 2 == 0 { "a" } else { "b" };
                cache.get(entity, &metric).map(|s| s.len()).unwrap_or(0)
            })
            .collect();
        assert!(lens.iter().enumerate().all(|(i, n)| *n == if i % 2 == 0 { 2 } else { 1 }));
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_clear() {
        let (records, metric) = fixture();
        let cache = SeriesCache::new(records);
        let entities = vec!["a".to_string(), "b".to_string()];
        cache.warm(&entities, std::slice::from_ref(&metric));
        assert_eq!(cache.stats().entries, 2);
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
