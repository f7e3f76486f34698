//! Persistence contracts for client records and report payloads.
//!
//! Two traits keep the concerns separable: the access controller only ever
//! sees [`ClientStore`], the gateway's push and data paths use
//! [`PayloadStore`]. Both backends implement both traits over one shared
//! state, so a [`StoreHandle`] is two views of the same store.

mod codec;
pub mod factory;
mod memory;
mod sqlite;
#[cfg(test)]
pub(crate) mod test_support;

pub use crate::error::StoreError;
pub use codec::{decode_timestamp, encode_timestamp, normalize_timestamp};
pub use factory::open_store;
pub use memory::InMemoryReportStore;
pub use sqlite::SqliteReportStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Per-client trial and window state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,
    pub trial_start: DateTime<Utc>,
    pub views_used: u32,
    /// `None` until the first window is opened.
    pub window_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
}

impl ClientRecord {
    /// A record as created on first push.
    pub fn new(client_id: impl Into<String>, trial_start: DateTime<Utc>) -> Self {
        Self {
            client_id: client_id.into(),
            trial_start: normalize_timestamp(trial_start),
            views_used: 0,
            window_expires_at: None,
            password_hash: None,
        }
    }

    pub fn requires_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|hash| !hash.is_empty())
    }

    /// The fields a renewal compare-and-swap is keyed on.
    pub fn prior_state(&self) -> PriorState {
        PriorState {
            views_used: self.views_used,
            window_expires_at: self.window_expires_at,
        }
    }
}

/// Snapshot of the mutable window fields a renewal expects to replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorState {
    pub views_used: u32,
    pub window_expires_at: Option<DateTime<Utc>>,
}

/// Result of a compare-and-swap renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Renewal {
    /// The window was opened; the record reflects the new state.
    Applied(ClientRecord),
    /// The stored state no longer matched the expected prior state (or the
    /// view budget was exhausted); nothing was written.
    Conflict,
}

/// Spreadsheet attachment kept in its base64 transport encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_b64: String,
}

/// The latest pushed report for a client. Replaced wholesale on each push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    /// Producer document without credential or attachment fields.
    pub document: serde_json::Value,
    pub attachment: Option<Attachment>,
    pub updated_at: DateTime<Utc>,
}

impl ReportPayload {
    pub fn new(
        document: serde_json::Value,
        attachment: Option<Attachment>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            document,
            attachment,
            updated_at: normalize_timestamp(updated_at),
        }
    }

    /// The `data` object of the document; an empty object when absent.
    pub fn data(&self) -> serde_json::Value {
        self.document
            .get("data")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()))
    }

    /// The optional `year` field, rendered as display text.
    pub fn year_label(&self) -> String {
        match self.document.get("year") {
            Some(serde_json::Value::String(year)) => year.clone(),
            Some(serde_json::Value::Number(year)) => year.to_string(),
            _ => String::new(),
        }
    }
}

/// Everything one producer push writes, applied as a single unit.
#[derive(Debug, Clone)]
pub struct PushRecord {
    pub client_id: String,
    pub received_at: DateTime<Utc>,
    /// `None` leaves an existing credential untouched.
    pub password_hash: Option<String>,
    pub payload: ReportPayload,
}

/// Client record persistence contract.
pub trait ClientStore: Send + Sync {
    fn name(&self) -> &str;

    fn health_check(&self) -> StoreFuture<'_, ()>;

    fn get<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<ClientRecord>>;

    /// Return the existing record, or create a fresh one with `trial_start = now`.
    fn create_if_absent<'a>(
        &'a self,
        client_id: &'a str,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, ClientRecord>;

    /// Open a new window ending at `new_expiry` and consume one view, but only
    /// if the stored state still equals `expected` and fewer than `max_views`
    /// views are used. Check and write happen in one atomic step.
    fn apply_renewal<'a>(
        &'a self,
        client_id: &'a str,
        new_expiry: DateTime<Utc>,
        expected: PriorState,
        max_views: u32,
    ) -> StoreFuture<'a, Renewal>;

    /// Returns `false` when no such client exists.
    fn set_password_hash<'a>(
        &'a self,
        client_id: &'a str,
        hash: &'a str,
    ) -> StoreFuture<'a, bool>;
}

/// Report payload persistence contract.
pub trait PayloadStore: Send + Sync {
    fn get_payload<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<ReportPayload>>;

    fn put_payload<'a>(
        &'a self,
        client_id: &'a str,
        payload: ReportPayload,
    ) -> StoreFuture<'a, ()>;

    /// Create the client if absent, update its credential when one is given,
    /// and replace its payload, all or nothing.
    fn record_push(&self, push: PushRecord) -> StoreFuture<'_, ClientRecord>;
}

/// The two views of one opened store.
#[derive(Clone)]
pub struct StoreHandle {
    pub clients: Arc<dyn ClientStore>,
    pub payloads: Arc<dyn PayloadStore>,
}

impl StoreHandle {
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: ClientStore + PayloadStore + 'static,
    {
        Self {
            clients: Arc::clone(&store) as Arc<dyn ClientStore>,
            payloads: store,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.clients.name()
    }
}
