use thiserror::Error;

/// Errors from the ambient runtime stack itself (as opposed to the
/// downstream clients it wraps).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A required environment variable was missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}
