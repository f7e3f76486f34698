use super::{
    ClientRecord, ClientStore, PayloadStore, PriorState, PushRecord, Renewal, ReportPayload,
    StoreFuture, normalize_timestamp,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Tables {
    clients: HashMap<String, ClientRecord>,
    payloads: HashMap<String, ReportPayload>,
}

/// Process-local store. Every operation runs under one lock, so the renewal
/// check-and-set is atomic with respect to every other request.
#[derive(Default)]
pub struct InMemoryReportStore {
    tables: Mutex<Tables>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }
}

fn renew_locked(
    tables: &mut Tables,
    client_id: &str,
    new_expiry: DateTime<Utc>,
    expected: PriorState,
    max_views: u32,
) -> Renewal {
    let Some(record) = tables.clients.get_mut(client_id) else {
        return Renewal::Conflict;
    };
    if record.prior_state() != expected || record.views_used >= max_views {
        return Renewal::Conflict;
    }
    record.views_used += 1;
    record.window_expires_at = Some(normalize_timestamp(new_expiry));
    Renewal::Applied(record.clone())
}

impl ClientStore for InMemoryReportStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn get<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<ClientRecord>> {
        Box::pin(async move { Ok(self.lock().clients.get(client_id).cloned()) })
    }

    fn create_if_absent<'a>(
        &'a self,
        client_id: &'a str,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, ClientRecord> {
        Box::pin(async move {
            let mut tables = self.lock();
            let record = tables
                .clients
                .entry(client_id.to_string())
                .or_insert_with(|| ClientRecord::new(client_id, now));
            Ok(record.clone())
        })
    }

    fn apply_renewal<'a>(
        &'a self,
        client_id: &'a str,
        new_expiry: DateTime<Utc>,
        expected: PriorState,
        max_views: u32,
    ) -> StoreFuture<'a, Renewal> {
        Box::pin(async move {
            let mut tables = self.lock();
            Ok(renew_locked(
                &mut tables,
                client_id,
                new_expiry,
                expected,
                max_views,
            ))
        })
    }

    fn set_password_hash<'a>(
        &'a self,
        client_id: &'a str,
        hash: &'a str,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.lock();
            Ok(tables.clients.get_mut(client_id).is_some_and(|record| {
                record.password_hash = Some(hash.to_string());
                true
            }))
        })
    }
}

impl PayloadStore for InMemoryReportStore {
    fn get_payload<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<ReportPayload>> {
        Box::pin(async move { Ok(self.lock().payloads.get(client_id).cloned()) })
    }

    fn put_payload<'a>(
        &'a self,
        client_id: &'a str,
        payload: ReportPayload,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.lock().payloads.insert(client_id.to_string(), payload);
            Ok(())
        })
    }

    fn record_push(&self, push: PushRecord) -> StoreFuture<'_, ClientRecord> {
        Box::pin(async move {
            let mut tables = self.lock();
            let record = tables
                .clients
                .entry(push.client_id.clone())
                .or_insert_with(|| ClientRecord::new(push.client_id.clone(), push.received_at));
            if let Some(hash) = push.password_hash {
                record.password_hash = Some(hash);
            }
            let snapshot = record.clone();
            tables.payloads.insert(push.client_id, push.payload);
            Ok(snapshot)
        })
    }
}
