//! Daily login streak tracking
//!
//! Streaks advance on UTC calendar days. A login on the same day is a no-op,
//! a login on the following day extends the streak, and a gap of two or
//! more days resets it to 1.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Persisted streak state for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub total_days_active: u32,
}

/// Which branch of the streak state machine a login took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakTransition {
    /// No previous activity recorded
    First,
    /// Already counted today (also used when the stored day is ahead of today)
    SameDay,
    /// Last activity was yesterday
    Consecutive,
    /// Gap of two or more days
    Broken,
}

impl StreakTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::SameDay => "same_day",
            Self::Consecutive => "consecutive",
            Self::Broken => "broken",
        }
    }

    /// Whether the transition changed stored state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::SameDay)
    }
}

impl StreakState {
    /// Classify a login on `today` without mutating.
    pub fn classify(&self, today: NaiveDate) -> StreakTransition {
        let Some(last) = self.last_activity_date else {
            return StreakTransition::First;
        };

        match (today - last).num_days() {
            d if d <= 0 => StreakTransition::SameDay,
            1 => StreakTransition::Consecutive,
            _ => StreakTransition::Broken,
        }
    }

    /// Advance the state machine for a login on `today`.
    pub fn advance(&mut self, today: NaiveDate) -> StreakTransition {
        let transition = self.classify(today);

        match transition {
            StreakTransition::SameDay => return transition,
            StreakTransition::First | StreakTransition::Broken => self.current_streak = 1,
            StreakTransition::Consecutive => self.current_streak += 1,
        }

        self.total_days_active += 1;
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_activity_date = Some(today);
        transition
    }

    pub fn multiplier(&self) -> f64 {
        streak_multiplier(self.current_streak)
    }
}

/// Reward multiplier tier for a streak length
pub fn streak_multiplier(current_streak: u32) -> f64 {
    match current_streak {
        s if s >= 30 => 2.0,
        s if s >= 7 => 1.5,
        s if s >= 3 => 1.25,
        _ => 1.0,
    }
}

/// Result of a daily login streak update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakUpdate {
    pub count: u32,
    pub longest: u32,
    pub multiplier: f64,
    pub total_days_active: u32,
    pub transition: StreakTransition,
}

impl StreakUpdate {
    pub fn new(state: &StreakState, transition: StreakTransition) -> Self {
        Self {
            count: state.current_streak,
            longest: state.longest_streak,
            multiplier: state.multiplier(),
            total_days_active: state.total_days_active,
            transition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_first_activity() {
        let mut state = StreakState::default();
        assert_eq!(state.advance(day(1)), StreakTransition::First);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 1);
        assert_eq!(state.total_days_active, 1);
        assert_eq!(state.last_activity_date, Some(day(1)));
    }

    #[test]
    fn test_same_day_is_idempotent() {
        let mut state = StreakState::default();
        state.advance(day(1));
        let snapshot = state.clone();
        assert_eq!(state.advance(day(1)), StreakTransition::SameDay);
        assert_eq!(state, snapshot);
    }

    #[test]
    fn test_consecutive_and_broken() {
        let mut state = StreakState::default();
        state.advance(day(1));
        assert_eq!(state.advance(day(2)), StreakTransition::Consecutive);
        assert_eq!(state.advance(day(3)), StreakTransition::Consecutive);
        assert_eq!(state.current_streak, 3);

        assert_eq!(state.advance(day(6)), StreakTransition::Broken);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 3);
        assert_eq!(state.total_days_active, 4);
    }

    #[test]
    fn test_stored_day_ahead_of_today_is_noop() {
        let mut state = StreakState::default();
        state.advance(day(5));
        assert_eq!(state.advance(day(4)), StreakTransition::SameDay);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.last_activity_date, Some(day(5)));
    }

    #[test]
    fn test_multiplier_tiers() {
        assert_eq!(streak_multiplier(0), 1.0);
        assert_eq!(streak_multiplier(2), 1.0);
        assert_eq!(streak_multiplier(3), 1.25);
        assert_eq!(streak_multiplier(6), 1.25);
        assert_eq!(streak_multiplier(7), 1.5);
        assert_eq!(streak_multiplier(29), 1.5);
        assert_eq!(streak_multiplier(30), 2.0);
        assert_eq!(streak_multiplier(365), 2.0);
    }
}
