use super::clock::Clock;
use super::policy::{AccessPolicy, Decision, DenyReason};
use super::Outcome;
use crate::store::{ClientRecord, ClientStore, Renewal, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Upper bound on reload-and-retry rounds after a lost compare-and-swap.
///
/// A loser normally needs one extra round: the winner's fresh window admits it
/// without mutation.
pub const MAX_RENEWAL_ATTEMPTS: usize = 8;

/// Decides whether a client may view its report right now.
pub struct AccessWindowController {
    store: Arc<dyn ClientStore>,
    policy: AccessPolicy,
    clock: Arc<dyn Clock>,
}

impl AccessWindowController {
    pub fn new(store: Arc<dyn ClientStore>, policy: AccessPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Admission for the report page. Opens a new window (consuming one view)
    /// when the current one has lapsed and the budget allows it.
    pub async fn evaluate(&self, client_id: &str) -> Result<Outcome, StoreError> {
        let now = self.clock.now();

        for attempt in 1..=MAX_RENEWAL_ATTEMPTS {
            let Some(record) = self.store.get(client_id).await? else {
                return Ok(denied(client_id, DenyReason::NoSuchClient));
            };

            match self.policy.decide(&record, now) {
                Decision::Deny(reason) => return Ok(denied(client_id, reason)),
                Decision::Admit => return Ok(admitted(record)),
                Decision::Renew { new_expiry } => {
                    let renewal = self
                        .store
                        .apply_renewal(
                            client_id,
                            new_expiry,
                            record.prior_state(),
                            self.policy.max_views,
                        )
                        .await?;
                    match renewal {
                        Renewal::Applied(updated) => {
                            tracing::info!(
                                client_id,
                                views_used = updated.views_used,
                                max_views = self.policy.max_views,
                                expires_at = %new_expiry,
                                "access window renewed"
                            );
                            return Ok(admitted(updated));
                        }
                        Renewal::Conflict => {
                            tracing::debug!(client_id, attempt, "renewal lost a race, re-evaluating");
                        }
                    }
                }
            }
        }

        tracing::warn!(client_id, attempts = MAX_RENEWAL_ATTEMPTS, "renewal retries exhausted");
        Err(StoreError::Contention {
            client_id: client_id.to_string(),
            attempts: MAX_RENEWAL_ATTEMPTS,
        })
    }

    /// Admission for the data API. Never renews and never writes.
    pub async fn check_window(&self, client_id: &str) -> Result<Outcome, StoreError> {
        let now = self.clock.now();
        let Some(record) = self.store.get(client_id).await? else {
            return Ok(denied(client_id, DenyReason::NoSuchClient));
        };

        Ok(match self.policy.decide_read_only(&record, now) {
            Decision::Deny(reason) => denied(client_id, reason),
            Decision::Admit | Decision::Renew { .. } => admitted(record),
        })
    }
}

fn admitted(record: ClientRecord) -> Outcome {
    tracing::debug!(
        client_id = %record.client_id,
        views_used = record.views_used,
        "access admitted"
    );
    Outcome::Admitted(record)
}

fn denied(client_id: &str, reason: DenyReason) -> Outcome {
    tracing::debug!(client_id, %reason, "access denied");
    Outcome::Denied(reason)
}
