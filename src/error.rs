use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `moltbot`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains at collaborator boundaries.
#[derive(Debug, Error)]
pub enum BotError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Durable state store ─────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Generation collaborator ─────────────────────────────────────────
    #[error("generation: {0}")]
    Generation(#[from] GenerationError),

    // ── Publish collaborator ────────────────────────────────────────────
    #[error("publish: {0}")]
    Publish(#[from] PublishError),

    // ── Signal collaborators (RSS / search) ─────────────────────────────
    #[error("signal: {0}")]
    Signal(#[from] SignalError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("read failed for key {key}: {message}")]
    Read { key: String, message: String },

    #[error("write failed for key {key}: {message}")]
    Write { key: String, message: String },

    #[error("serialization failed for key {key}: {message}")]
    Serde { key: String, message: String },
}

// ─── Generation collaborator errors ─────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation returned empty output")]
    EmptyOutput,
}

// ─── Publish collaborator errors ────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no target available in pools {pools:?}")]
    NoTarget { pools: Vec<String> },

    #[error("post to {target_id} failed: {message}")]
    Post { target_id: String, message: String },

    #[error("publish timed out after {secs}s")]
    Timeout { secs: u64 },
}

// ─── Signal collaborator errors ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("rss fetch failed: {0}")]
    Rss(String),

    #[error("search failed: {0}")]
    Search(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, BotError>;
