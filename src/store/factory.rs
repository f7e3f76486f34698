use super::{InMemoryReportStore, SqliteReportStore, StoreError, StoreHandle};
use crate::config::{StorageBackend, StorageConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Open the configured backend. The returned handle owns the connection pool;
/// there is no process-wide store.
pub async fn open_store(config: &StorageConfig, data_dir: &Path) -> Result<StoreHandle, StoreError> {
    match config.backend {
        StorageBackend::Sqlite => {
            let path = config.resolved_database_path(data_dir);
            tracing::info!(path = %path.display(), max_connections = config.max_connections, "opening sqlite report store");
            let store = SqliteReportStore::open(
                &path,
                config.max_connections,
                Duration::from_millis(config.busy_timeout_ms),
            )
            .await?;
            Ok(StoreHandle::new(Arc::new(store)))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory report store; state is lost on restart");
            Ok(StoreHandle::new(Arc::new(InMemoryReportStore::new())))
        }
    }
}
