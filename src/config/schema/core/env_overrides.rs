use super::types::Config;
use std::path::PathBuf;

fn env_value(primary: &str, fallback: Option<&str>) -> Option<String> {
    std::env::var(primary)
        .ok()
        .or_else(|| fallback.and_then(|key| std::env::var(key).ok()))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(primary: &str, fallback: Option<&str>) -> Option<T> {
    let raw = env_value(primary, fallback)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = primary, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

impl Config {
    /// Environment variables win over the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = env_value("REPORTGATE_API_KEY", Some("API_KEY")) {
            self.api_key = key;
        }

        if let Some(path) = env_value("REPORTGATE_DATABASE_PATH", Some("DATABASE_PATH")) {
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Some(days) = env_parsed("TRIAL_DAYS", None) {
            self.access.trial_days = days;
        }

        if let Some(views) = env_parsed("MAX_VIEWS", None) {
            self.access.max_views = views;
        }

        if let Some(hours) = env_parsed("HTML_VALID_HOURS", None) {
            self.access.html_valid_hours = hours;
        }

        if let Some(port) = env_parsed("REPORTGATE_PORT", Some("PORT")) {
            self.gateway.port = port;
        }

        if let Some(host) = env_value("REPORTGATE_HOST", Some("HOST")) {
            self.gateway.host = host;
        }

        if let Some(pool_max) = env_parsed("PG_POOL_MAX", None) {
            self.storage.max_connections = pool_max;
        }
    }
}
