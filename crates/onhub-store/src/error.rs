use onhub_types::EntityKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Everything the persistence layer can fail with. There is no retry policy
/// anywhere in the store: each call either succeeds or the operation is
/// abandoned.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Remote backend selected but the stored config is missing or empty.
    /// Raised before any network call.
    #[error("remote backend is not configured")]
    NotConfigured,

    /// Local backend only: `get`-for-update or `update` on an unknown id.
    /// The remote backend upserts instead of failing.
    #[error("no {} record with id {id}", kind.path_segment())]
    NotFound { kind: EntityKind, id: String },

    /// Non-2xx from the remote API. `message` carries the body's
    /// `message`/`error` field when parseable, else the numeric status.
    #[error("remote returned {status}: {message}")]
    Http { status: u16, message: String },

    /// A record failed schema validation at the adapter edge.
    #[error("malformed {} record: {source}", kind.path_segment())]
    Invalid {
        kind: EntityKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid credentials")]
    Unauthorized,

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

impl StoreError {
    pub(crate) fn not_found(kind: EntityKind, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
