//! Axum-based HTTP gateway with body limits and timeouts.
//!
//! Producers push reports with an API key; viewers sign in per client and
//! open the report page, which in turn fetches the data API.

pub mod credentials;
mod handlers;
pub mod paths;
mod push;
mod report;
pub mod response;
mod server;
pub mod session;

pub use push::{API_KEY_HEADER, parse_push_body};
pub use server::{build_app, build_state, run_gateway, run_gateway_with_listener};

use crate::Config;
use crate::access::AccessWindowController;
use crate::render::ReportRenderer;
use crate::store::StoreHandle;
use session::SessionGuard;
use std::sync::Arc;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: StoreHandle,
    pub controller: Arc<AccessWindowController>,
    pub renderer: Arc<ReportRenderer>,
    pub sessions: Arc<SessionGuard>,
}
