use thiserror::Error;

/// Errors from the denormalized order lookup client.
#[derive(Debug, Error)]
pub enum OrdersClientError {
    #[error("could not connect to order service: {0}")]
    Connect(#[from] tonic::transport::Error),

    #[error("order lookup failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// No order matches the requested number. Used by fake clients in tests;
    /// the real RPC reports this as a `tonic::Status` instead.
    #[error("no order found for number {0}")]
    NotFound(String),
}
