//! Public URL paths for a client. Client ids are opaque producer strings, so
//! they are percent-encoded as a single path segment.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn segment(client_id: &str) -> String {
    utf8_percent_encode(client_id, SEGMENT).to_string()
}

pub fn report_path(client_id: &str) -> String {
    format!("/report/{}", segment(client_id))
}

pub fn login_path(client_id: &str) -> String {
    format!("/report/{}/login", segment(client_id))
}

pub fn logout_path(client_id: &str) -> String {
    format!("/report/{}/logout", segment(client_id))
}

pub fn api_path(client_id: &str) -> String {
    format!("/api/report/{}", segment(client_id))
}
