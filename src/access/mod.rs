//! Trial and access-window admission control.
//!
//! Every client gets a calendar trial of `trial_days` and a budget of
//! `max_views` viewing windows, each lasting `window_hours`. Windows are
//! renewed lazily on the page path; the data path only checks.

pub mod clock;
pub mod controller;
pub mod policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{AccessWindowController, MAX_RENEWAL_ATTEMPTS};
pub use policy::{AccessPolicy, Decision, DenyReason};

use crate::store::ClientRecord;

/// Result of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Snapshot after any renewal just applied.
    Admitted(ClientRecord),
    Denied(DenyReason),
}

impl Outcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }

    pub fn record(&self) -> Option<&ClientRecord> {
        match self {
            Self::Admitted(record) => Some(record),
            Self::Denied(_) => None,
        }
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Admitted(_) => None,
            Self::Denied(reason) => Some(*reason),
        }
    }
}
