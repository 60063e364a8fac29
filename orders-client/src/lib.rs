//! gRPC client for the upstream order-service's denormalized order lookup.
//!
//! Grounded on
//! `examples/original_source/internal/order_created/clients/denormalized_order_client.go`:
//! a single unary `OrderDetails(order_number)` RPC returning the order's
//! number and priced line items, used by the poll daemon to build the
//! calculator's `Calculate` request body.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::OrdersClientError;

pub mod proto {
    #![allow(missing_docs, clippy::pedantic)]
    tonic::include_proto!("denormalized_order");
}

use proto::denormalized_order_service_client::DenormalizedOrderServiceClient;
use proto::OrderDetailsRequest;
use tonic::transport::Channel;

/// A line item on a denormalized order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Good {
    pub name: String,
    pub price: i64,
}

/// The order-service's view of an order, as needed to price an accrual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenormalizedOrder {
    pub number: String,
    pub goods: Vec<Good>,
}

impl From<proto::DenormalizedOrder> for DenormalizedOrder {
    fn from(order: proto::DenormalizedOrder) -> Self {
        Self {
            number: order.number,
            goods: order
                .goods
                .into_iter()
                .map(|g| Good {
                    name: g.name,
                    price: g.price,
                })
                .collect(),
        }
    }
}

/// The single operation the poll daemon needs from the order service,
/// factored out so daemon code can run against an in-memory fake in tests.
#[async_trait::async_trait]
pub trait OrdersApi: Send + Sync {
    /// See [`OrdersClient::find`].
    async fn find(&self, order_number: &str) -> Result<DenormalizedOrder, OrdersClientError>;
}

/// Thin `tonic`-backed client wrapping the order service's single RPC.
pub struct OrdersClient {
    inner: DenormalizedOrderServiceClient<Channel>,
}

impl OrdersClient {
    /// Connect to `addr` (e.g. `http://127.0.0.1:50051`).
    pub async fn connect(addr: impl Into<String>) -> Result<Self, OrdersClientError> {
        let addr = addr.into();
        let inner = DenormalizedOrderServiceClient::connect(addr.clone()).await.inspect_err(|err| {
            tracing::error!(addr, error = %err, "failed to connect to order service");
        })?;
        tracing::info!(addr, "connected to order service");
        Ok(Self { inner })
    }

    /// Look up the denormalized order for `order_number`.
    pub async fn find(&self, order_number: &str) -> Result<DenormalizedOrder, OrdersClientError> {
        let mut client = self.inner.clone();
        let request = tonic::Request::new(OrderDetailsRequest {
            order_number: order_number.to_string(),
        });
        let response = client.order_details(request).await.inspect_err(|err| {
            tracing::warn!(order_number, error = %err, "order lookup RPC failed");
        })?;
        Ok(response.into_inner().into())
    }
}

#[async_trait::async_trait]
impl OrdersApi for OrdersClient {
    async fn find(&self, order_number: &str) -> Result<DenormalizedOrder, OrdersClientError> {
        Self::find(self, order_number).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn denormalized_order_converts_from_wire_type() {
        let wire = proto::DenormalizedOrder {
            number: "42".into(),
            goods: vec![proto::Good {
                name: "widget".into(),
                price: 500,
            }],
        };
        let order: DenormalizedOrder = wire.into();
        assert_eq!(order.number, "42");
        assert_eq!(order.goods[0].price, 500);
    }
}
