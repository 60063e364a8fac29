use thiserror::Error;

/// Errors from the broker transport.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to connect to broker: {0}")]
    Connect(String),

    #[error("failed to fetch message: {0}")]
    Fetch(String),

    #[error("message had no payload")]
    EmptyPayload,

    #[error("failed to decode message: {0}")]
    Decode(#[from] bincode::Error),

    #[error("failed to commit offset: {0}")]
    Commit(String),

    #[error("failed to publish message: {0}")]
    Publish(String),
}
