use super::codec::{decode_optional, decode_timestamp, encode_optional, encode_timestamp};
use super::{
    Attachment, ClientRecord, ClientStore, PayloadStore, PriorState, PushRecord, Renewal,
    ReportPayload, StoreError, StoreFuture, normalize_timestamp,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQLite-backed client and payload store using an sqlx async pool.
pub struct SqliteReportStore {
    pool: SqlitePool,
}

const REPORT_SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS report_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const REPORT_SCHEMA_VERSION_KEY: &str = "report_schema_version";
const REPORT_SCHEMA_VERSION: u32 = 1;

const SELECT_CLIENT: &str = "SELECT client_id, password_hash, trial_start, views_used, window_expires_at
     FROM clients
     WHERE client_id = ?1";

async fn ensure_report_schema_version(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(REPORT_SCHEMA_META_TABLE).execute(pool).await?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM report_schema_meta WHERE key = ?1")
            .bind(REPORT_SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await?;

    if let Some((value,)) = stored_version {
        let parsed = value.parse::<u32>().map_err(|_| {
            StoreError::Migration(format!("invalid report schema version value: {value}"))
        })?;
        if parsed != REPORT_SCHEMA_VERSION {
            return Err(StoreError::Migration(format!(
                "incompatible report schema version: stored={parsed}, expected={REPORT_SCHEMA_VERSION}"
            )));
        }
        return Ok(());
    }

    let legacy_table_count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*)
         FROM sqlite_master
         WHERE type = 'table'
           AND name IN ('clients', 'payloads')",
    )
    .fetch_one(pool)
    .await?;

    if legacy_table_count.0 > 0 {
        return Err(StoreError::Migration(
            "legacy report database detected without schema version metadata".into(),
        ));
    }

    sqlx::query("INSERT INTO report_schema_meta (key, value) VALUES (?1, ?2)")
        .bind(REPORT_SCHEMA_VERSION_KEY)
        .bind(REPORT_SCHEMA_VERSION.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

impl SqliteReportStore {
    /// Open (or create) the database file at `path`.
    pub async fn open(
        path: &Path,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                StoreError::Unavailable(format!(
                    "create database directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Concurrent renewals wait for the writer instead of failing.
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        Self::new(pool).await
    }

    /// Open a private in-memory database.
    ///
    /// Every connection to `sqlite::memory:` is a separate database, so the
    /// pool is pinned to a single connection that never expires.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Self::new(pool).await
    }

    /// Create a new store with an existing pool and run migrations.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        ensure_report_schema_version(&pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS clients (
                 client_id TEXT PRIMARY KEY,
                 password_hash TEXT,
                 trial_start TEXT NOT NULL,
                 views_used INTEGER NOT NULL DEFAULT 0 CHECK (views_used >= 0),
                 window_expires_at TEXT
             )",
        )
        .execute(&pool)
        .await
        .map_err(|err| StoreError::Migration(format!("create clients table: {err}")))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS payloads (
                 client_id TEXT PRIMARY KEY,
                 payload_json TEXT NOT NULL,
                 updated_at TEXT NOT NULL,
                 excel_filename TEXT,
                 excel_b64 TEXT
             )",
        )
        .execute(&pool)
        .await
        .map_err(|err| StoreError::Migration(format!("create payloads table: {err}")))?;

        Ok(Self { pool })
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_client_row(row: &SqliteRow) -> Result<ClientRecord, StoreError> {
    let trial_start_raw: String = row.try_get("trial_start")?;
    let expires_raw: Option<String> = row.try_get("window_expires_at")?;
    let views_used_raw: i64 = row.try_get("views_used")?;
    let views_used = u32::try_from(views_used_raw)
        .map_err(|_| StoreError::Corrupt(format!("views_used out of range: {views_used_raw}")))?;

    Ok(ClientRecord {
        client_id: row.try_get("client_id")?,
        trial_start: decode_timestamp(&trial_start_raw)?,
        views_used,
        window_expires_at: decode_optional(expires_raw.as_deref())?,
        password_hash: row.try_get("password_hash")?,
    })
}

fn map_payload_row(row: &SqliteRow) -> Result<ReportPayload, StoreError> {
    let payload_raw: String = row.try_get("payload_json")?;
    let updated_raw: String = row.try_get("updated_at")?;
    let filename: Option<String> = row.try_get("excel_filename")?;
    let content_b64: Option<String> = row.try_get("excel_b64")?;

    let document = serde_json::from_str::<serde_json::Value>(&payload_raw)
        .map_err(|err| StoreError::Corrupt(format!("payload_json: {err}")))?;
    let attachment = match (filename, content_b64) {
        (Some(filename), Some(content_b64)) => Some(Attachment {
            filename,
            content_b64,
        }),
        _ => None,
    };

    Ok(ReportPayload {
        document,
        attachment,
        updated_at: decode_timestamp(&updated_raw)?,
    })
}

fn encode_document(payload: &ReportPayload) -> Result<String, StoreError> {
    serde_json::to_string(&payload.document)
        .map_err(|err| StoreError::Corrupt(format!("serialize payload: {err}")))
}

impl ClientStore for SqliteReportStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
    }

    fn get<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<ClientRecord>> {
        Box::pin(async move {
            let row = sqlx::query(SELECT_CLIENT)
                .bind(client_id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(|r| map_client_row(&r)).transpose()
        })
    }

    fn create_if_absent<'a>(
        &'a self,
        client_id: &'a str,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, ClientRecord> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "INSERT INTO clients (client_id, password_hash, trial_start, views_used, window_expires_at)
                 VALUES (?1, NULL, ?2, 0, NULL)
                 ON CONFLICT(client_id) DO NOTHING",
            )
            .bind(client_id)
            .bind(encode_timestamp(now))
            .execute(&mut *tx)
            .await?;

            let row = sqlx::query(SELECT_CLIENT)
                .bind(client_id)
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;

            map_client_row(&row)
        })
    }

    fn apply_renewal<'a>(
        &'a self,
        client_id: &'a str,
        new_expiry: DateTime<Utc>,
        expected: PriorState,
        max_views: u32,
    ) -> StoreFuture<'a, Renewal> {
        Box::pin(async move {
            let new_expiry = normalize_timestamp(new_expiry);
            let mut tx = self.pool.begin().await?;

            // `IS` compares NULL to NULL as equal, so a never-opened window
            // matches an expected `None`.
            let result = sqlx::query(
                "UPDATE clients
                 SET views_used = views_used + 1, window_expires_at = ?1
                 WHERE client_id = ?2
                   AND views_used = ?3
                   AND window_expires_at IS ?4
                   AND views_used < ?5",
            )
            .bind(encode_timestamp(new_expiry))
            .bind(client_id)
            .bind(i64::from(expected.views_used))
            .bind(encode_optional(expected.window_expires_at))
            .bind(i64::from(max_views))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(Renewal::Conflict);
            }

            let row = sqlx::query(SELECT_CLIENT)
                .bind(client_id)
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;

            Ok(Renewal::Applied(map_client_row(&row)?))
        })
    }

    fn set_password_hash<'a>(
        &'a self,
        client_id: &'a str,
        hash: &'a str,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query("UPDATE clients SET password_hash = ?1 WHERE client_id = ?2")
                .bind(hash)
                .bind(client_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }
}

impl PayloadStore for SqliteReportStore {
    fn get_payload<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, Option<ReportPayload>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT payload_json, updated_at, excel_filename, excel_b64
                 FROM payloads
                 WHERE client_id = ?1",
            )
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(|r| map_payload_row(&r)).transpose()
        })
    }

    fn put_payload<'a>(
        &'a self,
        client_id: &'a str,
        payload: ReportPayload,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            upsert_payload(&self.pool, client_id, &payload).await?;
            Ok(())
        })
    }

    fn record_push(&self, push: PushRecord) -> StoreFuture<'_, ClientRecord> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "INSERT INTO clients (client_id, password_hash, trial_start, views_used, window_expires_at)
                 VALUES (?1, ?2, ?3, 0, NULL)
                 ON CONFLICT(client_id) DO UPDATE
                 SET password_hash = COALESCE(excluded.password_hash, clients.password_hash)",
            )
            .bind(&push.client_id)
            .bind(push.password_hash.as_deref())
            .bind(encode_timestamp(push.received_at))
            .execute(&mut *tx)
            .await?;

            upsert_payload(&mut *tx, &push.client_id, &push.payload).await?;

            let row = sqlx::query(SELECT_CLIENT)
                .bind(&push.client_id)
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;

            map_client_row(&row)
        })
    }
}

async fn upsert_payload<'e, E>(
    executor: E,
    client_id: &str,
    payload: &ReportPayload,
) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let (filename, content_b64) = match &payload.attachment {
        Some(attachment) => (
            Some(attachment.filename.as_str()),
            Some(attachment.content_b64.as_str()),
        ),
        None => (None, None),
    };

    sqlx::query(
        "INSERT INTO payloads (client_id, payload_json, updated_at, excel_filename, excel_b64)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(client_id) DO UPDATE SET
             payload_json = excluded.payload_json,
             updated_at = excluded.updated_at,
             excel_filename = excluded.excel_filename,
             excel_b64 = excluded.excel_b64",
    )
    .bind(client_id)
    .bind(encode_document(payload)?)
    .bind(encode_timestamp(payload.updated_at))
    .bind(filename)
    .bind(content_b64)
    .execute(executor)
    .await?;

    Ok(())
}
