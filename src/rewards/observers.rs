//! Post-commit reward observers
//!
//! Badge checks, goal progress and notifications react to rewards but are
//! not part of the reward transaction. Observers run only after a commit
//! succeeds and their failures are logged, never propagated.

use std::sync::Arc;

use tracing::{debug, warn};

use super::events::RewardRequest;
use super::models::RewardOutcome;

/// Downstream collaborator notified after each committed reward
pub trait RewardObserver: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    fn on_reward(&self, request: &RewardRequest, outcome: &RewardOutcome) -> anyhow::Result<()>;
}

/// Notify every observer, isolating failures from each other and the caller
pub(crate) fn dispatch(
    observers: &[Arc<dyn RewardObserver>],
    request: &RewardRequest,
    outcome: &RewardOutcome,
) {
    for observer in observers {
        match observer.on_reward(request, outcome) {
            Ok(()) => debug!(observer = observer.name(), "Reward observer notified"),
            Err(e) => warn!(
                observer = observer.name(),
                user_id = %request.user_id,
                event_type = %request.event_type,
                "Reward observer failed: {:#}",
                e
            ),
        }
    }
}
