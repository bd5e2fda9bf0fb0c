//! XP and Level curve
//!
//! Levels follow `floor(100 * n^1.3)` XP thresholds. Level 1 starts at 0 XP
//! and the curve is capped at [`LEVEL_CAP`].

use serde::{Deserialize, Serialize};

/// Highest reachable level
pub const LEVEL_CAP: u32 = 1000;

const CURVE_BASE: f64 = 100.0;
const CURVE_EXPONENT: f64 = 1.3;

/// Total XP required to reach level `n`.
pub fn xp_for_level(n: u32) -> i64 {
    if n <= 1 {
        return 0;
    }
    (CURVE_BASE * f64::from(n).powf(CURVE_EXPONENT)).floor() as i64
}

/// Greatest level whose threshold is at or below `xp`, capped at [`LEVEL_CAP`].
pub fn level_from_xp(xp: i64) -> u32 {
    if xp <= 0 {
        return 1;
    }

    // Binary search for the last level with xp_for_level(level) <= xp
    let (mut lo, mut hi) = (1u32, LEVEL_CAP);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if xp_for_level(mid) <= xp {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// A level transition reported back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub previous_level: u32,
    pub new_level: u32,
}

/// Level progress derived from lifetime XP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub lifetime_xp: i64,
    pub level: u32,
    /// XP threshold of the current level
    pub current_level_xp: i64,
    /// XP threshold of the next level (None at the cap)
    pub next_level_xp: Option<i64>,
}

impl LevelProgress {
    pub fn new(lifetime_xp: i64) -> Self {
        let lifetime_xp = lifetime_xp.max(0);
        let level = level_from_xp(lifetime_xp);
        let next_level_xp = (level < LEVEL_CAP).then(|| xp_for_level(level + 1));

        Self {
            lifetime_xp,
            level,
            current_level_xp: xp_for_level(level),
            next_level_xp,
        }
    }

    /// Calculate progress to next level (0.0 - 1.0)
    pub fn progress_to_next(&self) -> f32 {
        match self.next_level_xp {
            Some(next) => {
                let xp_in_level = self.lifetime_xp - self.current_level_xp;
                let xp_for_level = next - self.current_level_xp;
                if xp_for_level <= 0 {
                    1.0
                } else {
                    (xp_in_level as f32 / xp_for_level as f32).clamp(0.0, 1.0)
                }
            }
            None => 1.0,
        }
    }

    /// XP still missing for the next level (0 at the cap)
    pub fn xp_to_next(&self) -> i64 {
        self.next_level_xp
            .map(|next| (next - self.lifetime_xp).max(0))
            .unwrap_or(0)
    }

    pub fn is_max_level(&self) -> bool {
        self.next_level_xp.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xp_for_level_curve_points() {
        assert_eq!(xp_for_level(0), 0);
        assert_eq!(xp_for_level(1), 0);
        assert_eq!(xp_for_level(2), 246);
        assert_eq!(xp_for_level(10), 1995);
    }

    #[test]
    fn test_curve_strictly_increasing_to_cap() {
        for n in 1..LEVEL_CAP {
            assert!(
                xp_for_level(n + 1) > xp_for_level(n),
                "curve not increasing at level {}",
                n
            );
        }
    }

    #[test]
    fn test_level_round_trip_to_cap() {
        for n in 1..=LEVEL_CAP {
            assert_eq!(level_from_xp(xp_for_level(n)), n);
        }
    }

    #[test]
    fn test_level_from_xp_boundaries() {
        assert_eq!(level_from_xp(-50), 1);
        assert_eq!(level_from_xp(0), 1);
        assert_eq!(level_from_xp(245), 1);
        assert_eq!(level_from_xp(246), 2);
        assert_eq!(level_from_xp(xp_for_level(3) - 1), 2);
        assert_eq!(level_from_xp(i64::MAX), LEVEL_CAP);
    }

    #[test]
    fn test_level_progress() {
        // Halfway between level 2 (246) and level 3 (417)
        let progress = LevelProgress::new(246 + 85);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.current_level_xp, 246);
        assert_eq!(progress.next_level_xp, Some(xp_for_level(3)));
        assert!((progress.progress_to_next() - 85.0 / 171.0).abs() < 0.01);

        let capped = LevelProgress::new(xp_for_level(LEVEL_CAP) + 10);
        assert!(capped.is_max_level());
        assert_eq!(capped.xp_to_next(), 0);
        assert_eq!(capped.progress_to_next(), 1.0);
    }
}
