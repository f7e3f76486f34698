use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// Process-local maps; state is lost on restart.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// SQLite database file. Relative paths resolve against the data directory;
    /// unset means `<data dir>/reportgate.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Pool size (default: 5)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a connection waits on a locked database (default: 5000 ms)
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StorageConfig {
    /// Resolve the database file against `data_dir`.
    pub fn resolved_database_path(&self, data_dir: &std::path::Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => data_dir.join(path),
            None => data_dir.join("reportgate.db"),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("storage.max_connections must be a positive integer".into());
        }
        Ok(())
    }
}
