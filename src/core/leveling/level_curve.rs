// Level curve - maps total XP to a level.
//
// Pure math, no storage. Both variants are strictly increasing step functions:
// level `n` is reached once XP is at least `T(n)`, and `T(n) < T(n + 1)`.

use super::leveling_models::LevelingError;

/// XP threshold function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelCurve {
    /// `T(n) = base * n^2`. Unbounded.
    Quadratic { base: u64 },
    /// Explicit table: `T(1) = table[0]`, `T(2) = table[1]`, ...
    /// Levels stop at `table.len()`.
    Thresholds(Vec<u64>),
}

impl Default for LevelCurve {
    fn default() -> Self {
        LevelCurve::Quadratic { base: 50 }
    }
}

impl LevelCurve {
    pub fn quadratic(base: u64) -> Result<Self, LevelingError> {
        if base == 0 {
            return Err(LevelingError::InvalidArgument(
                "Quadratic curve base must be at least 1".to_string(),
            ));
        }
        Ok(LevelCurve::Quadratic { base })
    }

    /// Build a table curve. Values must be non-empty, start above zero and be
    /// strictly increasing.
    pub fn thresholds(table: Vec<u64>) -> Result<Self, LevelingError> {
        if table.is_empty() {
            return Err(LevelingError::InvalidArgument(
                "Level threshold table must not be empty".to_string(),
            ));
        }
        if table[0] == 0 {
            return Err(LevelingError::InvalidArgument(
                "Level 1 threshold must be above zero".to_string(),
            ));
        }
        if let Some(pair) = table.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(LevelingError::InvalidArgument(format!(
                "Level thresholds must be strictly increasing ({} >= {})",
                pair[0], pair[1]
            )));
        }
        Ok(LevelCurve::Thresholds(table))
    }

    /// Parse a comma separated threshold list such as `"10,30,60"`.
    pub fn parse_thresholds(raw: &str) -> Result<Self, LevelingError> {
        let table = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u64>().map_err(|_| {
                    LevelingError::InvalidArgument(format!("'{}' is not a valid XP threshold", part))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::thresholds(table)
    }

    /// Highest level whose threshold is `<= xp`.
    pub fn level_from_xp(&self, xp: u64) -> u32 {
        match self {
            LevelCurve::Quadratic { base } => {
                let level = integer_sqrt(xp / (*base).max(1));
                u32::try_from(level).unwrap_or(u32::MAX)
            }
            LevelCurve::Thresholds(table) => {
                // Table is sorted, so the partition point is the count of reached thresholds.
                let reached = table.partition_point(|&threshold| threshold <= xp);
                u32::try_from(reached).unwrap_or(u32::MAX)
            }
        }
    }

    /// XP needed to reach `level`. `None` when the curve has no such level.
    pub fn threshold_for(&self, level: u32) -> Option<u64> {
        if level == 0 {
            return Some(0);
        }
        match self {
            LevelCurve::Quadratic { base } => {
                let level = u64::from(level);
                Some(base.saturating_mul(level.saturating_mul(level)))
            }
            LevelCurve::Thresholds(table) => table.get(level as usize - 1).copied(),
        }
    }
}

/// floor(sqrt(n)) without going through floating point for the final answer.
fn integer_sqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    let mut root = (n as f64).sqrt() as u64;
    // f64 can be off by one near the top of the u64 range; overflow counts as "too big".
    while root.checked_mul(root).map_or(true, |square| square > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).is_some_and(|square| square <= n) {
        root += 1;
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_matches_base_times_square() {
        let curve = LevelCurve::default();
        assert_eq!(curve.level_from_xp(0), 0);
        assert_eq!(curve.level_from_xp(49), 0);
        assert_eq!(curve.level_from_xp(50), 1);
        assert_eq!(curve.level_from_xp(199), 1);
        assert_eq!(curve.level_from_xp(200), 2);
        assert_eq!(curve.level_from_xp(450), 3);
        assert_eq!(curve.threshold_for(3), Some(450));
    }

    #[test]
    fn quadratic_survives_huge_xp() {
        let curve = LevelCurve::quadratic(1).unwrap();
        assert_eq!(curve.level_from_xp(u64::MAX), u32::MAX);
        assert_eq!(integer_sqrt(u64::MAX), 4_294_967_295);
    }

    #[test]
    fn table_counts_reached_thresholds() {
        let curve = LevelCurve::thresholds(vec![10, 30]).unwrap();
        assert_eq!(curve.level_from_xp(0), 0);
        assert_eq!(curve.level_from_xp(9), 0);
        assert_eq!(curve.level_from_xp(10), 1);
        assert_eq!(curve.level_from_xp(29), 1);
        assert_eq!(curve.level_from_xp(30), 2);
        assert_eq!(curve.level_from_xp(10_000), 2);
        assert_eq!(curve.threshold_for(2), Some(30));
        assert_eq!(curve.threshold_for(3), None);
    }

    #[test]
    fn level_is_monotonic_in_xp() {
        let curves = [
            LevelCurve::default(),
            LevelCurve::thresholds(vec![5, 6, 100, 1_000]).unwrap(),
        ];
        for curve in curves {
            let mut previous = 0;
            for xp in 0..2_000 {
                let level = curve.level_from_xp(xp);
                assert!(level >= previous, "level dropped at xp {}", xp);
                previous = level;
            }
        }
    }

    #[test]
    fn rejects_bad_tables() {
        assert!(LevelCurve::thresholds(vec![]).is_err());
        assert!(LevelCurve::thresholds(vec![0, 10]).is_err());
        assert!(LevelCurve::thresholds(vec![10, 10]).is_err());
        assert!(LevelCurve::thresholds(vec![30, 10]).is_err());
        assert!(LevelCurve::quadratic(0).is_err());
    }

    #[test]
    fn parses_comma_list() {
        let curve = LevelCurve::parse_thresholds(" 10, 30 ,60").unwrap();
        assert_eq!(curve, LevelCurve::Thresholds(vec![10, 30, 60]));
        assert!(LevelCurve::parse_thresholds("10,abc").is_err());
    }
}
