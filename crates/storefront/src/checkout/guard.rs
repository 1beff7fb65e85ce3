//! Per-attempt submission guard.
//!
//! Admits one in-flight settlement per checkout attempt across all requests
//! served by this process. Entries expire on their own so a crashed request
//! cannot lock an attempt forever; the hold outlasts the slowest settlement
//! the configured call timeout allows. Confirmed attempts are remembered so
//! a request that loaded its session before the settlement was saved gets
//! the existing confirmation instead of settling again.

use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use furnimart_core::CheckoutAttemptId;

use super::state::Confirmation;

/// Upper bound on sequential collaborator calls in one settlement, plus
/// the session write that follows it.
const SETTLEMENT_CALLS: u32 = 16;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

const CONFIRMED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct SubmissionGuard {
    held: Cache<Uuid, ()>,
    confirmed: Cache<Uuid, Confirmation>,
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self::for_call_timeout(DEFAULT_CALL_TIMEOUT)
    }
}

impl SubmissionGuard {
    #[must_use]
    pub fn new(max_hold: Duration) -> Self {
        Self {
            held: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(max_hold)
                .build(),
            confirmed: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(CONFIRMED_TTL)
                .build(),
        }
    }

    /// A guard whose hold covers a full settlement where every call runs
    /// up to `call_timeout`.
    #[must_use]
    pub fn for_call_timeout(call_timeout: Duration) -> Self {
        Self::new(Self::hold_for(call_timeout))
    }

    #[must_use]
    pub fn hold_for(call_timeout: Duration) -> Duration {
        call_timeout.saturating_mul(SETTLEMENT_CALLS)
    }

    /// Claim the attempt. Returns `false` if it is already claimed.
    pub async fn try_acquire(&self, attempt: CheckoutAttemptId) -> bool {
        self.held
            .entry(attempt.as_uuid())
            .or_insert(())
            .await
            .is_fresh()
    }

    pub async fn release(&self, attempt: CheckoutAttemptId) {
        self.held.invalidate(&attempt.as_uuid()).await;
    }

    /// Whether a settlement for the attempt is running right now.
    #[must_use]
    pub fn is_held(&self, attempt: CheckoutAttemptId) -> bool {
        self.held.contains_key(&attempt.as_uuid())
    }

    pub(super) async fn record_confirmation(
        &self,
        attempt: CheckoutAttemptId,
        confirmation: Confirmation,
    ) {
        self.confirmed.insert(attempt.as_uuid(), confirmation).await;
    }

    /// The confirmation of an attempt that already settled.
    pub(super) async fn confirmation(&self, attempt: CheckoutAttemptId) -> Option<Confirmation> {
        self.confirmed.get(&attempt.as_uuid()).await
    }
}
