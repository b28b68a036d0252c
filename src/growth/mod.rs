//! Growth Score Engine
//!
//! Relative performance grading of a population of entities tracked per
//! episode:
//! - Per-entity, per-metric series extraction with a per-run cache
//! - Mean and least-squares slope at arbitrary cutoffs
//! - Quintile grades (S..D, +2..-2) relative to the population
//! - Composite grades, grade evolution and a 5x5 positioning map

pub mod cache;
pub mod composite;
pub mod engine;
pub mod evolution;
pub mod grade;
pub mod metric;
pub mod positioning;
pub mod record;
pub mod series;
pub mod stats;

pub use cache::{CacheStats, SeriesCache};
pub use composite::{CompositeScorer, GradeRow, GradeTable, MetricGrade};
pub use engine::{GrowthEngine, GrowthReport, Population};
pub use evolution::{EvolutionPoint, EvolutionTracker};
pub use grade::{AbsoluteGrade, Direction, QuantileGrader, RankPosition, Standing, TrendGrade};
pub use metric::{Aggregation, CorrectionRule, DetailGate, MetricDefinition, MetricRegistry};
pub use positioning::PositioningMap;
pub use record::{EntityProfile, RawRecord, RecordSet, SheetRow};
pub use series::{SeriesExtractor, TimeSeries};
pub use stats::{Cutoff, StatResult, StatisticsComputer};
