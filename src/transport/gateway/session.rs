//! Server-side viewer sessions.
//!
//! A browser holds one random token in the `report_session` cookie; the guard
//! keeps only its SHA-256 hash together with the set of clients the token has
//! unlocked. Sessions expire after an idle TTL.
//!
//! The guard also tracks failed password attempts per client and locks the
//! login form after too many of them.

use axum::http::{HeaderMap, header};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const SESSION_COOKIE: &str = "report_session";

/// Maximum consecutive wrong passwords before lockout.
const MAX_FAILURES: u32 = 5;
/// Lockout duration in seconds after too many failures.
const LOCKOUT_SECS: u64 = 300;
/// Live sessions kept at once; the least recently used one is evicted beyond this.
const MAX_SESSIONS: usize = 10_000;

/// SHA-256 hash a token for storage (never store plaintext).
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

struct Session {
    clients: HashSet<String>,
    last_seen: Instant,
}

#[derive(Default)]
struct FailureState {
    count: u32,
    lockout_until: Option<Instant>,
}

pub struct SessionGuard {
    ttl: Duration,
    max_sessions: usize,
    sessions: Mutex<HashMap<String, Session>>,
    failures: Mutex<HashMap<String, FailureState>>,
}

impl SessionGuard {
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_max_sessions(ttl_secs, MAX_SESSIONS)
    }

    pub fn with_max_sessions(ttl_secs: u64, max_sessions: usize) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            max_sessions: max_sessions.max(1),
            sessions: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    fn is_live(&self, now: Instant, session: &Session) -> bool {
        now.duration_since(session.last_seen) < self.ttl
    }

    /// Grant `client_id` to the session behind `presented`, or to a fresh
    /// session when the presented token is missing or expired. Returns the
    /// token the browser should hold from now on.
    pub fn authorize(&self, presented: Option<&str>, client_id: &str) -> String {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, session| self.is_live(now, session));

        if let Some(token) = presented.filter(|token| !token.is_empty()) {
            if let Some(session) = sessions.get_mut(&hash_token(token)) {
                session.clients.insert(client_id.to_string());
                session.last_seen = now;
                return token.to_string();
            }
        }

        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, session)| session.last_seen)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
        }

        let token = generate_session_token();
        sessions.insert(
            hash_token(&token),
            Session {
                clients: HashSet::from([client_id.to_string()]),
                last_seen: now,
            },
        );
        token
    }

    /// Whether the presented token currently unlocks `client_id`. A hit
    /// refreshes the idle timer.
    pub fn is_authorized(&self, presented: Option<&str>, client_id: &str) -> bool {
        let Some(token) = presented.filter(|token| !token.is_empty()) else {
            return false;
        };
        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let key = hash_token(token);
        let Some(session) = sessions.get_mut(&key) else {
            return false;
        };
        if !self.is_live(now, session) {
            sessions.remove(&key);
            return false;
        }
        if !session.clients.contains(client_id) {
            return false;
        }
        session.last_seen = now;
        true
    }

    /// Drop `client_id` from the session; the session itself goes away once
    /// it unlocks nothing.
    pub fn revoke(&self, presented: Option<&str>, client_id: &str) {
        let Some(token) = presented.filter(|token| !token.is_empty()) else {
            return;
        };
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let key = hash_token(token);
        if let Some(session) = sessions.get_mut(&key) {
            session.clients.remove(client_id);
            if session.clients.is_empty() {
                sessions.remove(&key);
            }
        }
    }

    pub fn active_sessions(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|session| self.is_live(now, session))
            .count()
    }

    /// `Err(remaining_secs)` while the client's login form is locked.
    pub fn check_lockout(&self, client_id: &str) -> Result<(), u64> {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(until) = failures.get(client_id).and_then(|state| state.lockout_until) {
            let remaining = until.saturating_duration_since(Instant::now());
            if !remaining.is_zero() {
                return Err(remaining.as_secs().max(1));
            }
        }
        Ok(())
    }

    pub fn record_failure(&self, client_id: &str) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let state = failures.entry(client_id.to_string()).or_default();
        state.count += 1;
        if state.count >= MAX_FAILURES {
            state.lockout_until = Some(Instant::now() + Duration::from_secs(LOCKOUT_SECS));
            state.count = 0;
        }
    }

    pub fn clear_failures(&self, client_id: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(client_id);
    }
}

fn generate_session_token() -> String {
    use rand::RngCore;
    let mut buf = [0u8; 32];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// The session token from the request's `Cookie` headers, if any.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(token: &str, ttl_secs: u64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
