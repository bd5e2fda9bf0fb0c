//! Reward rules table
//!
//! Maps a validated event payload to a (points, XP) delta. Only
//! `daily_login` is streak-scaled; everything else is a fixed table entry
//! with the lesson and test modifiers applied on top.

use serde::{Deserialize, Serialize};

use super::events::{EventPayload, EventType};

/// Base reward for an event type
#[derive(Debug, Clone, Copy)]
pub struct RewardRule {
    pub event_type: EventType,
    pub points: i64,
    pub xp: i64,
}

/// All base rewards (one entry per known event type)
pub static REWARD_TABLE: &[RewardRule] = &[
    RewardRule {
        event_type: EventType::DailyLogin,
        points: 10,
        xp: 10,
    },
    RewardRule {
        event_type: EventType::LessonComplete,
        points: 50,
        xp: 50,
    },
    RewardRule {
        event_type: EventType::TestSolved,
        points: 10,
        xp: 10,
    },
    RewardRule {
        event_type: EventType::LiveCodingCompleted,
        points: 100,
        xp: 100,
    },
    RewardRule {
        event_type: EventType::BugFixCompleted,
        points: 75,
        xp: 75,
    },
    RewardRule {
        event_type: EventType::HackathonSubmission,
        points: 150,
        xp: 150,
    },
    RewardRule {
        event_type: EventType::HackathonFinalist,
        points: 400,
        xp: 400,
    },
    RewardRule {
        event_type: EventType::HackathonWinner,
        points: 1200,
        xp: 1200,
    },
    RewardRule {
        event_type: EventType::JobApplication,
        points: 20,
        xp: 20,
    },
    RewardRule {
        event_type: EventType::InterviewScheduled,
        points: 60,
        xp: 60,
    },
    RewardRule {
        event_type: EventType::DailyStrikeCompleted,
        points: 100,
        xp: 100,
    },
    RewardRule {
        event_type: EventType::PostCreated,
        points: 5,
        xp: 5,
    },
];

/// Bonus points (not XP) for a perfect lesson
pub const PERFECT_LESSON_BONUS: i64 = 20;

/// Reward for repeat test solves
pub const REPEAT_TEST_REWARD: i64 = 3;

impl RewardRule {
    pub fn for_type(event_type: EventType) -> Option<&'static RewardRule> {
        REWARD_TABLE.iter().find(|r| r.event_type == event_type)
    }
}

/// Points and XP granted for one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDelta {
    pub points: i64,
    pub xp: i64,
}

impl RewardDelta {
    pub const ZERO: RewardDelta = RewardDelta { points: 0, xp: 0 };

    pub fn is_zero(&self) -> bool {
        self.points == 0 && self.xp == 0
    }
}

/// Compute the delta for a payload.
///
/// `streak_multiplier` is only consulted for `daily_login` and must be the
/// multiplier of the post-update streak.
pub fn compute_delta(payload: &EventPayload, streak_multiplier: f64) -> RewardDelta {
    let Some(rule) = payload.event_type().and_then(RewardRule::for_type) else {
        return RewardDelta::ZERO;
    };

    match payload {
        EventPayload::DailyLogin => {
            let scaled = (rule.points as f64 * streak_multiplier).floor() as i64;
            RewardDelta {
                points: scaled,
                xp: scaled,
            }
        }
        EventPayload::LessonComplete(p) => RewardDelta {
            points: rule.points + if p.perfect_score { PERFECT_LESSON_BONUS } else { 0 },
            xp: rule.xp,
        },
        EventPayload::TestSolved(p) if !p.first_attempt => RewardDelta {
            points: REPEAT_TEST_REWARD,
            xp: REPEAT_TEST_REWARD,
        },
        _ => RewardDelta {
            points: rule.points,
            xp: rule.xp,
        },
    }
}
