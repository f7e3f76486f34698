use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 5000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Allow binding to non-localhost addresses (default: false)
    #[serde(default)]
    pub allow_public_bind: bool,
    /// Maximum request body, sized for base64 spreadsheet attachments (default: 16 MiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Idle lifetime of a login session in seconds (default: 12h)
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Mark the session cookie `Secure` (enable behind TLS)
    #[serde(default)]
    pub cookie_secure: bool,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_session_ttl_secs() -> u64 {
    12 * 60 * 60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            allow_public_bind: false,
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            cookie_secure: false,
        }
    }
}
