use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `reportgate`.
///
/// Config loading, store opening and gateway state construction return it.
/// The binary edge wraps it in `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Storage ─────────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Rendering ───────────────────────────────────────────────────────
    #[error("render: {0}")]
    Render(#[from] RenderError),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ─── Store errors ────────────────────────────────────────────────────────────

/// Failures of the backing store.
///
/// None of these is a business denial: a trial that ended is an
/// [`crate::access::Outcome`], never a `StoreError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("renewal for client {client_id} kept losing races after {attempts} attempts")]
    Contention { client_id: String, attempts: usize },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

// ─── Render errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template render failed: {0}")]
    Template(String),

    #[error("template not found: {0}")]
    NotFound(String),
}

impl From<tera::Error> for RenderError {
    fn from(err: tera::Error) -> Self {
        Self::Template(err.to_string())
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ReportError>;
