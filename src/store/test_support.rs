//! Store double that injects backend failures around an in-memory store.

use super::{
    ClientRecord, ClientStore, InMemoryReportStore, PayloadStore, PriorState, PushRecord,
    Renewal, ReportPayload, StoreError, StoreFuture,
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Every client lookup fails.
    GetFails,
    /// Lookups work; every renewal write fails.
    RenewalFails,
    /// Lookups work; every renewal loses its compare-and-swap.
    RenewalConflicts,
}

pub(crate) struct FaultyStore {
    inner: InMemoryReportStore,
    fault: Fault,
    renewal_attempts: AtomicUsize,
}

impl FaultyStore {
    pub(crate) fn new(fault: Fault) -> Self {
        Self {
            inner: InMemoryReportStore::new(),
            fault,
            renewal_attempts: AtomicUsize::new(0),
        }
    }

    /// The healthy store underneath, for seeding.
    pub(crate) fn inner(&self) -> &InMemoryReportStore {
        &self.inner
    }

    pub(crate) fn renewal_attempts(&self) -> usize {
        self.renewal_attempts.load(Ordering::SeqCst)
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("database is locked".into())
}

impl ClientStore for FaultyStore {
    fn name(&self) -> &str {
        "faulty"
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        self.inner.health_check()
    }

    fn get<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<ClientRecord>> {
        if self.fault == Fault::GetFails {
            return Box::pin(async { Err(unavailable()) });
        }
        self.inner.get(client_id)
    }

    fn create_if_absent<'a>(
        &'a self,
        client_id: &'a str,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, ClientRecord> {
        self.inner.create_if_absent(client_id, now)
    }

    fn apply_renewal<'a>(
        &'a self,
        client_id: &'a str,
        new_expiry: DateTime<Utc>,
        expected: PriorState,
        max_views: u32,
    ) -> StoreFuture<'a, Renewal> {
        self.renewal_attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match self.fault {
                Fault::RenewalFails => Err(unavailable()),
                Fault::RenewalConflicts => Ok(Renewal::Conflict),
                Fault::GetFails => {
                    self.inner
                        .apply_renewal(client_id, new_expiry, expected, max_views)
                        .await
                }
            }
        })
    }

    fn set_password_hash<'a>(
        &'a self,
        client_id: &'a str,
        hash: &'a str,
    ) -> StoreFuture<'a, bool> {
        self.inner.set_password_hash(client_id, hash)
    }
}

impl PayloadStore for FaultyStore {
    fn get_payload<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<ReportPayload>> {
        self.inner.get_payload(client_id)
    }

    fn put_payload<'a>(
        &'a self,
        client_id: &'a str,
        payload: ReportPayload,
    ) -> StoreFuture<'a, ()> {
        self.inner.put_payload(client_id, payload)
    }

    fn record_push(&self, push: PushRecord) -> StoreFuture<'_, ClientRecord> {
        self.inner.record_push(push)
    }
}
