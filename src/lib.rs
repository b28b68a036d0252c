//! Growth Score Engine
//! 
//! Relative performance grading for TV productions tracked per episode:
//! - Metric registry with aggregation, media and correction rules
//! - Cached per-entity series extraction
//! - Quintile grades relative to the compared population
//! - Composite grades, grade evolution and a positioning map

pub mod config;
pub mod error;
pub mod growth;
pub mod utils;

// Re-exports for convenience
pub use config::GrowthConfig;
pub use error::{GradingError, Result};
pub use growth::{
    AbsoluteGrade, Cutoff, GradeTable, GrowthEngine, GrowthReport, MetricRegistry, Population, RawRecord,
    RecordSet, TrendGrade,
};
