use crate::config::AccessConfig;
use crate::store::ClientRecord;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// The three fixed limits governing every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessPolicy {
    pub trial_days: u32,
    pub max_views: u32,
    pub window_hours: u32,
}

impl From<&AccessConfig> for AccessPolicy {
    fn from(config: &AccessConfig) -> Self {
        Self {
            trial_days: config.trial_days,
            max_views: config.max_views,
            window_hours: config.html_valid_hours,
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::from(&AccessConfig::default())
    }
}

/// Why a client was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    #[strum(to_string = "No client")]
    NoSuchClient,
    #[strum(to_string = "Trial ended")]
    TrialEnded,
    #[strum(to_string = "Trial limit reached")]
    LimitReached,
    /// Only produced by the read-only check.
    #[strum(to_string = "Access window expired")]
    WindowExpired,
}

impl DenyReason {
    /// Unknown clients are "not found"; every other denial is "forbidden".
    pub fn is_not_found(self) -> bool {
        matches!(self, Self::NoSuchClient)
    }
}

/// What the policy says to do with a loaded record at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Deny(DenyReason),
    /// The current window is still open; nothing to write.
    Admit,
    /// Open a new window ending at `new_expiry`, consuming one view.
    Renew { new_expiry: DateTime<Utc> },
}

impl AccessPolicy {
    pub fn trial_length(&self) -> Duration {
        Duration::days(i64::from(self.trial_days))
    }

    pub fn window_length(&self) -> Duration {
        Duration::hours(i64::from(self.window_hours))
    }

    /// Saturates at the latest representable instant.
    pub fn trial_ends_at(&self, record: &ClientRecord) -> DateTime<Utc> {
        record
            .trial_start
            .checked_add_signed(self.trial_length())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The trial end is inclusive: at exactly `trial_start + trial_days` the
    /// client is still admitted.
    pub fn trial_active(&self, record: &ClientRecord, now: DateTime<Utc>) -> bool {
        now <= self.trial_ends_at(record)
    }

    /// Also inclusive: a window is valid through its expiry instant.
    pub fn window_open(record: &ClientRecord, now: DateTime<Utc>) -> bool {
        record.window_expires_at.is_some_and(|expires| now <= expires)
    }

    pub fn views_remaining(&self, record: &ClientRecord) -> u32 {
        self.max_views.saturating_sub(record.views_used)
    }

    /// A new window never ends before the trial started, even under clock skew.
    fn renewal_expiry(&self, record: &ClientRecord, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(record.trial_start)
            .checked_add_signed(self.window_length())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The admission rule for the page path, where renewal is allowed.
    pub fn decide(&self, record: &ClientRecord, now: DateTime<Utc>) -> Decision {
        if !self.trial_active(record, now) {
            return Decision::Deny(DenyReason::TrialEnded);
        }
        if Self::window_open(record, now) {
            return Decision::Admit;
        }
        if record.views_used >= self.max_views {
            return Decision::Deny(DenyReason::LimitReached);
        }
        Decision::Renew {
            new_expiry: self.renewal_expiry(record, now),
        }
    }

    /// The admission rule for the data path: never renews.
    pub fn decide_read_only(&self, record: &ClientRecord, now: DateTime<Utc>) -> Decision {
        if !self.trial_active(record, now) {
            return Decision::Deny(DenyReason::TrialEnded);
        }
        if Self::window_open(record, now) {
            Decision::Admit
        } else {
            Decision::Deny(DenyReason::WindowExpired)
        }
    }
}
