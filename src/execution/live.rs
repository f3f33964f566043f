use std::time::Duration;

use async_trait::async_trait;

use crate::error::BotError;
use crate::execution::adapter::ExecutionAdapter;
use crate::models::{Order, OrderRequest, OrderStatus};

/// Acknowledgement returned by the venue for a submitted order.
#[derive(Debug, Clone)]
pub struct VenueOrderAck {
    pub exchange_id: String,
    pub status: OrderStatus,
    pub filled_quantity: f64,
    pub avg_fill_price: Option<f64>,
}

/// An order the venue reports as open, as seen during reconciliation.
#[derive(Debug, Clone)]
pub struct VenueOpenOrder {
    pub exchange_id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub quantity: f64,
}

/// Thin transport-level client for a real venue. Implementations own
/// authentication, signing, and wire formats; the adapter owns timeouts
/// and order state.
#[async_trait]
pub trait VenueClient: Send + Sync {
    async fn place_order(&self, request: &OrderRequest, client_order_id: &str)
        -> anyhow::Result<VenueOrderAck>;
    async fn cancel_order(&self, symbol: &str, exchange_id: &str) -> anyhow::Result<()>;
    async fn open_orders(&self) -> anyhow::Result<Vec<VenueOpenOrder>>;
    async fn account_balance(&self) -> anyhow::Result<f64>;
}

/// Live execution against a real venue. Every call is bounded by the
/// configured timeout so a stalled venue cannot wedge the trading loop.
pub struct LiveAdapter {
    client: Box<dyn VenueClient>,
    timeout: Duration,
}

impl LiveAdapter {
    pub fn new(client: Box<dyn VenueClient>, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl std::future::Future<Output = anyhow::Result<T>> + Send,
    ) -> crate::Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(BotError::Execution(format!("{what} failed: {err:#}"))),
            Err(_) => Err(BotError::Execution(format!(
                "{what} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl ExecutionAdapter for LiveAdapter {
    async fn submit_order(&mut self, request: OrderRequest) -> crate::Result<Order> {
        let mut order = Order::new(request);
        let ack = self
            .bounded(
                "order submission",
                self.client.place_order(
                    &OrderRequest {
                        symbol: order.symbol.clone(),
                        side: order.side,
                        quantity: order.quantity,
                        order_type: order.order_type,
                    },
                    &order.client_order_id,
                ),
            )
            .await;

        let ack = match ack {
            Ok(ack) => ack,
            Err(err) => {
                tracing::warn!(
                    client_order_id = %order.client_order_id,
                    error = %err,
                    "venue submission failed"
                );
                order.mark_error(err.to_string());
                return Ok(order);
            }
        };

        order.exchange_id = Some(ack.exchange_id);
        match ack.status {
            OrderStatus::Filled | OrderStatus::PartiallyFilled => {
                order.transition(OrderStatus::Submitted)?;
                if let Some(price) = ack.avg_fill_price {
                    order.record_fill(ack.filled_quantity, price)?;
                } else {
                    tracing::warn!(
                        client_order_id = %order.client_order_id,
                        "venue reported a fill without a price"
                    );
                    order.mark_error("venue reported fill without a price");
                    return Ok(order);
                }
            }
            OrderStatus::Rejected => {
                order.transition(OrderStatus::Submitted)?;
                order.transition(OrderStatus::Rejected)?;
                tracing::warn!(
                    client_order_id = %order.client_order_id,
                    "venue rejected order"
                );
            }
            other => {
                order.transition(OrderStatus::Submitted)?;
                tracing::debug!(
                    client_order_id = %order.client_order_id,
                    status = ?other,
                    "order resting on venue"
                );
            }
        }

        Ok(order)
    }

    async fn cancel_order(&mut self, order: &Order) -> crate::Result<Order> {
        let exchange_id = order.exchange_id.as_deref().ok_or_else(|| {
            BotError::Execution(format!(
                "order {} has no exchange id, cannot cancel",
                order.client_order_id
            ))
        })?;

        self.bounded(
            "order cancellation",
            self.client.cancel_order(&order.symbol, exchange_id),
        )
        .await?;

        let mut canceled = order.clone();
        canceled.transition(OrderStatus::Canceled)?;
        Ok(canceled)
    }

    async fn get_order_status(&self, client_order_id: &str) -> crate::Result<Option<Order>> {
        let venue_orders = self
            .bounded("open orders query", self.client.open_orders())
            .await?;

        Ok(venue_orders
            .into_iter()
            .find(|v| v.client_order_id.as_deref() == Some(client_order_id))
            .map(order_from_venue))
    }

    async fn open_orders(&self) -> crate::Result<Vec<Order>> {
        let venue_orders = self
            .bounded("open orders query", self.client.open_orders())
            .await?;

        // Reconciliation only needs identity; venue-open orders without a
        // client id we recognize are reported as-is and left untouched.
        Ok(venue_orders.into_iter().map(order_from_venue).collect())
    }

    async fn get_balance(&self) -> crate::Result<f64> {
        self.bounded("balance query", self.client.account_balance())
            .await
            .map_err(|err| match err {
                BotError::Execution(msg) => BotError::Provider(msg),
                other => other,
            })
    }

    fn name(&self) -> &str {
        "live"
    }
}

fn order_from_venue(v: VenueOpenOrder) -> Order {
    let mut order = Order::new(OrderRequest {
        symbol: v.symbol,
        side: crate::models::OrderSide::Buy,
        quantity: v.quantity,
        order_type: crate::models::OrderType::Limit,
    });
    if let Some(id) = v.client_order_id {
        order.client_order_id = id;
    }
    order.exchange_id = Some(v.exchange_id);
    order.status = OrderStatus::Submitted;
    order
}
