//! Positioning Map
//!
//! 5x5 grid of entities keyed by (composite absolute grade, composite trend
//! grade) at one cutoff.

use serde::Serialize;

use super::composite::GradeTable;
use super::grade::{AbsoluteGrade, TrendGrade};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositioningMap {
    /// `cells[absolute][trend]`, best row and column first
    cells: [[Vec<String>; 5]; 5],
}

impl PositioningMap {
    /// Rows missing either composite grade are left out entirely.
    pub fn build(table: &GradeTable) -> Self {
        let mut map = Self::default();
        for row in &table.rows {
            if let (Some(a), Some(t)) = (row.composite_absolute, row.composite_trend) {
                map.cells[a.index()][t.index()].push(row.entity.clone());
            }
        }
        map
    }

    pub fn cell(&self, absolute: AbsoluteGrade, trend: TrendGrade) -> &[String] {
        &self.cells[absolute.index()][trend.index()]
    }

    /// Shade of a cell: mean of the two grade scores, 1.0 ..= 5.0.
    pub fn cell_intensity(absolute: AbsoluteGrade, trend: TrendGrade) -> f64 {
        (absolute.score() as f64 + trend.score() as f64) / 2.0
    }

    /// Every cell in row-major order, empty ones included.
    pub fn iter(&self) -> impl Iterator<Item = (AbsoluteGrade, TrendGrade, &[String])> + '_ {
        AbsoluteGrade::LABELS.into_iter().flat_map(move |a| {
            TrendGrade::LABELS
                .into_iter()
                .map(move |t| (a, t, self.cell(a, t)))
        })
    }

    pub fn placed(&self) -> usize {
        self.cells.iter().flatten().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::composite::GradeRow;
    use crate::growth::grade::combined_grade;
    use crate::growth::stats::Cutoff;

    fn row(entity: &str, a: Option<AbsoluteGrade>, t: Option<TrendGrade>) -> GradeRow {
        GradeRow {
            entity: entity.to_string(),
            cutoff: Cutoff::new(4).unwrap(),
            metrics: vec![],
            mean_absolute_percentile: None,
            mean_trend_percentile: None,
            composite_absolute: a,
            composite_trend: t,
            composite_grade: combined_grade(a, t),
        }
    }

    #[test]
    fn test_build_groups_by_cell() {
        let table = GradeTable {
            cutoff: Cutoff::new(4).unwrap(),
            rows: vec![
                row("x", Some(AbsoluteGrade::S), Some(TrendGrade::Up1)),
                row("y", Some(AbsoluteGrade::C), Some(TrendGrade::Flat)),
                row("z", Some(AbsoluteGrade::S), Some(TrendGrade::Up1)),
                row("no-trend", Some(AbsoluteGrade::A), None),
                row("nothing", None, None),
            ],
        };
        let map = PositioningMap::build(&table);
        assert_eq!(map.cell(AbsoluteGrade::S, TrendGrade::Up1), &["x".to_string(), "z".to_string()]);
        assert_eq!(map.cell(AbsoluteGrade::C, TrendGrade::Flat), &["y".to_string()]);
        assert_eq!(map.placed(), 3);
        assert_eq!(map.iter().count(), 25);
    }

    #[test]
    fn test_cell_intensity() {
        assert_eq!(PositioningMap::cell_intensity(AbsoluteGrade::S, TrendGrade::Up2), 5.0);
        assert_eq!(PositioningMap::cell_intensity(AbsoluteGrade::D, TrendGrade::Down2), 1.0);
        assert_eq!(PositioningMap::cell_intensity(AbsoluteGrade::A, TrendGrade::Flat), 3.5);
    }
}
