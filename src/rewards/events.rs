//! Rewardable event types and their typed payloads
//!
//! Event types form a closed set. Unknown tags are carried through as raw
//! strings so newer producers never break older engines; they simply earn
//! nothing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{Result, RewardError};
use super::time_bucket::day_bucket;

/// Known rewardable actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DailyLogin,
    LessonComplete,
    TestSolved,
    LiveCodingCompleted,
    BugFixCompleted,
    HackathonSubmission,
    HackathonFinalist,
    HackathonWinner,
    JobApplication,
    InterviewScheduled,
    DailyStrikeCompleted,
    PostCreated,
}

impl EventType {
    pub const ALL: [EventType; 12] = [
        Self::DailyLogin,
        Self::LessonComplete,
        Self::TestSolved,
        Self::LiveCodingCompleted,
        Self::BugFixCompleted,
        Self::HackathonSubmission,
        Self::HackathonFinalist,
        Self::HackathonWinner,
        Self::JobApplication,
        Self::InterviewScheduled,
        Self::DailyStrikeCompleted,
        Self::PostCreated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyLogin => "daily_login",
            Self::LessonComplete => "lesson_complete",
            Self::TestSolved => "test_solved",
            Self::LiveCodingCompleted => "live_coding_completed",
            Self::BugFixCompleted => "bug_fix_completed",
            Self::HackathonSubmission => "hackathon_submission",
            Self::HackathonFinalist => "hackathon_finalist",
            Self::HackathonWinner => "hackathon_winner",
            Self::JobApplication => "job_application",
            Self::InterviewScheduled => "interview_scheduled",
            Self::DailyStrikeCompleted => "daily_strike_completed",
            Self::PostCreated => "post_created",
        }
    }

    /// Parse a raw type tag; None for tags this engine does not know
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// Types that may be rewarded at most once per UTC day
    pub fn is_daily(&self) -> bool {
        matches!(self, Self::DailyLogin | Self::DailyStrikeCompleted)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `lesson_complete`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonCompletePayload {
    pub lesson_id: Option<String>,
    pub perfect_score: bool,
}

/// Payload of `test_solved`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestSolvedPayload {
    pub quiz_id: Option<String>,
    pub quiz_attempt_id: Option<String>,
    pub first_attempt: bool,
}

/// Payload of fixed-reward actions that point at a single target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetPayload {
    #[serde(
        alias = "caseId",
        alias = "hackathonId",
        alias = "jobId",
        alias = "interviewId",
        alias = "postId"
    )]
    pub target_id: Option<String>,
}

/// Validated payload, one shape per event type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    DailyLogin,
    LessonComplete(LessonCompletePayload),
    TestSolved(TestSolvedPayload),
    Target(EventType, TargetPayload),
    /// Tag not in the known set
    Unrecognized(String),
}

impl EventPayload {
    /// Validate a raw JSON payload against the shape of `tag`.
    ///
    /// Missing fields take their defaults; fields of the wrong JSON type are
    /// rejected. A null payload is treated as an empty object.
    pub fn parse(tag: &str, raw: &Value) -> Result<Self> {
        let Some(event_type) = EventType::parse(tag) else {
            return Ok(Self::Unrecognized(tag.to_string()));
        };

        let raw = match raw {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let invalid = |e: serde_json::Error| RewardError::InvalidPayload {
            event_type: tag.to_string(),
            reason: e.to_string(),
        };

        Ok(match event_type {
            EventType::DailyLogin => {
                if !raw.is_object() {
                    return Err(RewardError::InvalidPayload {
                        event_type: tag.to_string(),
                        reason: "payload must be a JSON object".to_string(),
                    });
                }
                Self::DailyLogin
            }
            EventType::LessonComplete => {
                Self::LessonComplete(serde_json::from_value(raw).map_err(invalid)?)
            }
            EventType::TestSolved => {
                Self::TestSolved(serde_json::from_value(raw).map_err(invalid)?)
            }
            other => Self::Target(other, serde_json::from_value(raw).map_err(invalid)?),
        })
    }

    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Self::DailyLogin => Some(EventType::DailyLogin),
            Self::LessonComplete(_) => Some(EventType::LessonComplete),
            Self::TestSolved(_) => Some(EventType::TestSolved),
            Self::Target(t, _) => Some(*t),
            Self::Unrecognized(_) => None,
        }
    }

    /// Identifier of the one-shot thing this action refers to, if any
    fn target_id(&self) -> Option<&str> {
        match self {
            Self::LessonComplete(p) => p.lesson_id.as_deref(),
            Self::TestSolved(p) => p.quiz_attempt_id.as_deref(),
            Self::Target(_, p) => p.target_id.as_deref(),
            Self::DailyLogin | Self::Unrecognized(_) => None,
        }
    }

    /// Deduplication key for the event ledger.
    ///
    /// Daily types bucket on the UTC day, one-shot types key on their target,
    /// and everything else is not deduplicated.
    pub fn dedup_key(&self, user_id: &str, day: NaiveDate) -> Option<String> {
        let event_type = self.event_type()?;
        if event_type.is_daily() {
            return Some(format!("{}:{}:{}", event_type, user_id, day_bucket(day)));
        }
        self.target_id()
            .filter(|id| !id.is_empty())
            .map(|id| format!("{}:{}:{}", event_type, user_id, id))
    }
}

/// Row of the append-only event ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub user_id: String,
    pub event_type: String,
    pub payload: Value,
    pub dedup_key: Option<String>,
    /// ms since epoch
    pub created_at: i64,
    pub applied_at: Option<i64>,
}

/// Input to the rules engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRequest {
    pub user_id: String,
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    /// Originating event for provenance
    #[serde(default)]
    pub source_event_id: Option<String>,
}

impl RewardRequest {
    pub fn new(user_id: impl Into<String>, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            user_id: user_id.into(),
            event_type: event_type.into(),
            payload,
            source_event_id: None,
        }
    }
}

impl From<&Event> for RewardRequest {
    fn from(event: &Event) -> Self {
        Self {
            user_id: event.user_id.clone(),
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            source_event_id: Some(event.id.clone()),
        }
    }
}
