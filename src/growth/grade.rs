//! Quantile Grading
//!
//! Population-relative ordinal grades. Each valid statistic gets an average
//! rank (ties share the mean of their positions), the rank becomes a
//! fraction `p = (rank - 1) / (n - 1)` with 0 for the best entity, and `p`
//! falls into one of five right-inclusive buckets
//! `[0, .2] (.2, .4] (.4, .6] (.6, .8] (.8, 1]`.
//!
//! Bucket assignment runs on integers (doubled ranks), so a fraction sitting
//! exactly on a boundary always lands in the lower bucket.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Grade of the absolute level, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbsoluteGrade {
    S,
    A,
    B,
    C,
    D,
}

impl AbsoluteGrade {
    pub const LABELS: [AbsoluteGrade; 5] = [
        AbsoluteGrade::S,
        AbsoluteGrade::A,
        AbsoluteGrade::B,
        AbsoluteGrade::C,
        AbsoluteGrade::D,
    ];

    /// S = 5 down to D = 1.
    pub fn score(self) -> u8 {
        5 - self.index() as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AbsoluteGrade::S => "S",
            AbsoluteGrade::A => "A",
            AbsoluteGrade::B => "B",
            AbsoluteGrade::C => "C",
            AbsoluteGrade::D => "D",
        }
    }
}

impl fmt::Display for AbsoluteGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grade of the trend, steepest rise first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrendGrade {
    #[serde(rename = "+2")]
    Up2,
    #[serde(rename = "+1")]
    Up1,
    #[serde(rename = "0")]
    Flat,
    #[serde(rename = "-1")]
    Down1,
    #[serde(rename = "-2")]
    Down2,
}

impl TrendGrade {
    pub const LABELS: [TrendGrade; 5] = [
        TrendGrade::Up2,
        TrendGrade::Up1,
        TrendGrade::Flat,
        TrendGrade::Down1,
        TrendGrade::Down2,
    ];

    /// +2 = 5 down to -2 = 1.
    pub fn score(self) -> u8 {
        5 - self.index() as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrendGrade::Up2 => "+2",
            TrendGrade::Up1 => "+1",
            TrendGrade::Flat => "0",
            TrendGrade::Down1 => "-1",
            TrendGrade::Down2 => "-2",
        }
    }
}

impl fmt::Display for TrendGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `A+1`, or just `A` when there is no trend grade.
pub fn combined_grade(absolute: Option<AbsoluteGrade>, trend: Option<TrendGrade>) -> Option<String> {
    let absolute = absolute?;
    Some(match trend {
        Some(t) => format!("{}{}", absolute, t),
        None => absolute.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    HigherIsBetter,
    LowerIsBetter,
}

/// Average rank of one entity within a population, kept doubled so ties
/// stay integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankPosition {
    twice_rank: u64,
    population: u64,
}

impl RankPosition {
    /// Average rank, 1 = best.
    pub fn rank(&self) -> f64 {
        self.twice_rank as f64 / 2.0
    }

    /// `(rank - 1) / (n - 1)`: 0 for the best, 1 for the worst.
    pub fn fraction(&self) -> f64 {
        if self.population <= 1 {
            return 0.0;
        }
        (self.twice_rank - 2) as f64 / (2 * (self.population - 1)) as f64
    }

    /// 1 for the best, 0 for the worst.
    pub fn standing(&self) -> f64 {
        1.0 - self.fraction()
    }

    /// `standing` as an exact fraction.
    pub fn exact_standing(&self) -> Standing {
        if self.population <= 1 {
            return Standing::ONE;
        }
        let den = 2 * (self.population - 1);
        Standing::new((2 * self.population - self.twice_rank) as u128, den as u128)
    }

    /// Smallest `k` with `fraction <= (k + 1) / 5`.
    pub fn bucket(&self) -> usize {
        if self.population <= 1 {
            return 0;
        }
        let num = 5 * (self.twice_rank - 2);
        let den = 2 * (self.population - 1);
        let ceil = num.div_ceil(den) as usize;
        ceil.saturating_sub(1).min(4)
    }
}

/// Non-negative rational standing, kept reduced. Averages of standings stay
/// exact, so entities with equal mean standing always tie.
#[derive(Debug, Clone, Copy)]
pub struct Standing {
    num: u128,
    den: u128,
}

impl Standing {
    pub const ONE: Standing = Standing { num: 1, den: 1 };

    fn new(num: u128, den: u128) -> Self {
        let g = gcd(num, den).max(1);
        Self { num: num / g, den: den / g }
    }

    /// Exact arithmetic mean; `None` for an empty slice.
    pub fn mean(values: &[Standing]) -> Option<Standing> {
        let first = *values.first()?;
        let sum = values[1..].iter().fold(first, |acc, v| {
            Standing::new(acc.num * v.den + v.num * acc.den, acc.den * v.den)
        });
        Some(Standing::new(sum.num, sum.den * values.len() as u128))
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl PartialEq for Standing {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Standing {}

impl PartialOrd for Standing {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Standing {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num * other.den).cmp(&(other.num * self.den))
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

pub struct QuantileGrader;

impl QuantileGrader {
    /// Rank positions aligned with `stats`; `None` (and non-finite values)
    /// stay out of the population.
    pub fn rank(stats: &[Option<f64>], direction: Direction) -> Vec<Option<RankPosition>> {
        let finite: Vec<Option<f64>> = stats.iter().map(|s| s.filter(|v| v.is_finite())).collect();
        Self::rank_by(&finite, |a, b| {
            let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
            match direction {
                Direction::HigherIsBetter => ord.reverse(),
                Direction::LowerIsBetter => ord,
            }
        })
    }

    /// Rank positions under `best_first`, which orders better values first.
    /// Values it reports `Equal` share their average rank.
    pub fn rank_by<T, F>(stats: &[Option<T>], best_first: F) -> Vec<Option<RankPosition>>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        let mut valid: Vec<(usize, &T)> = stats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
            .collect();

        let mut out = vec![None; stats.len()];
        if valid.is_empty() {
            return out;
        }

        valid.sort_by(|a, b| best_first(a.1, b.1).then(a.0.cmp(&b.0)));

        let n = valid.len() as u64;
        let mut start = 0;
        while start < valid.len() {
            let mut end = start;
            while end + 1 < valid.len() && best_first(valid[end + 1].1, valid[start].1) == Ordering::Equal {
                end += 1;
            }
            // 1-based positions start+1 ..= end+1
            let twice_rank = (start + 1 + end + 1) as u64;
            for (idx, _) in &valid[start..=end] {
                out[*idx] = Some(RankPosition { twice_rank, population: n });
            }
            start = end + 1;
        }
        out
    }

    /// Labels aligned with `stats`, `labels[0]` for the best bucket.
    pub fn grade<L: Copy>(stats: &[Option<f64>], labels: &[L; 5], direction: Direction) -> Vec<Option<L>> {
        Self::rank(stats, direction)
            .into_iter()
            .map(|pos| pos.map(|p| labels[p.bucket()]))
            .collect()
    }

    /// Standings aligned with `stats`: 1 for the best, 0 for the worst.
    pub fn standings(stats: &[Option<f64>], direction: Direction) -> Vec<Option<f64>> {
        Self::rank(stats, direction)
            .into_iter()
            .map(|pos| pos.map(|p| p.standing()))
            .collect()
    }
}
