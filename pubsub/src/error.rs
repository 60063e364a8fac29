use thiserror::Error;

/// Errors from the pub/sub hint queue.
#[derive(Debug, Error)]
pub enum PubsubError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode message: {0}")]
    Encode(#[from] bincode::Error),
}
