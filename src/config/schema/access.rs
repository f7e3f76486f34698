use serde::{Deserialize, Serialize};

/// Trial and access-window limits, read once at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Calendar length of the trial after first push (default: 3 days)
    #[serde(default = "default_trial_days")]
    pub trial_days: u32,
    /// Number of windows a client may open during the trial (default: 3)
    #[serde(default = "default_max_views")]
    pub max_views: u32,
    /// Length of one viewing window in hours (default: 24)
    #[serde(default = "default_html_valid_hours")]
    pub html_valid_hours: u32,
}

/// One hundred years; anything longer is a typo.
const MAX_TRIAL_DAYS: u32 = 36_500;
const MAX_HTML_VALID_HOURS: u32 = MAX_TRIAL_DAYS * 24;

fn default_trial_days() -> u32 {
    3
}

fn default_max_views() -> u32 {
    3
}

fn default_html_valid_hours() -> u32 {
    24
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            trial_days: default_trial_days(),
            max_views: default_max_views(),
            html_valid_hours: default_html_valid_hours(),
        }
    }
}

impl AccessConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.trial_days == 0 {
            return Err("access.trial_days must be a positive integer".into());
        }
        if self.max_views == 0 {
            return Err("access.max_views must be a positive integer".into());
        }
        if self.html_valid_hours == 0 {
            return Err("access.html_valid_hours must be a positive integer".into());
        }
        if self.trial_days > MAX_TRIAL_DAYS {
            return Err(format!("access.trial_days must be at most {MAX_TRIAL_DAYS}"));
        }
        if self.html_valid_hours > MAX_HTML_VALID_HOURS {
            return Err(format!(
                "access.html_valid_hours must be at most {MAX_HTML_VALID_HOURS}"
            ));
        }
        Ok(())
    }
}
