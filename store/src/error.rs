use thiserror::Error;

/// Errors the event repository can surface. Lock contention on the
/// `NOWAIT` path is deliberately *not* a variant here — it's folded into
/// `Ok(None)` by `first_outbox_event`, since a busy row is not a failure —
/// another worker will pick it up.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection pool or a query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row's `message` column didn't deserialize into `Meta`.
    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// A row's `name` or `state` column held a value outside the known enum.
    #[error("unknown event name or state: {0}")]
    UnknownVariant(String),
}
