use async_trait::async_trait;

use crate::models::{Order, OrderRequest};

/// Venue-facing side of execution. Implemented by the paper simulator and
/// the live venue adapter; the router treats both identically.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// Submit an order. On success the returned order has progressed past
    /// Created (Submitted, Filled, or PartiallyFilled depending on venue
    /// behavior). Rejections surface as an order in Rejected status and
    /// venue faults as an order in Error status, not as an Err; Err is
    /// reserved for local state errors such as an illegal transition.
    async fn submit_order(&mut self, request: OrderRequest) -> crate::Result<Order>;

    /// Request cancellation of a previously submitted order.
    async fn cancel_order(&mut self, order: &Order) -> crate::Result<Order>;

    /// Latest known state of an order by client order id. None when the
    /// adapter has no record of the id.
    async fn get_order_status(&self, client_order_id: &str) -> crate::Result<Option<Order>>;

    /// Orders the venue considers open, keyed by client order id. Used by
    /// startup reconciliation.
    async fn open_orders(&self) -> crate::Result<Vec<Order>>;

    /// Account balance in quote currency.
    async fn get_balance(&self) -> crate::Result<f64>;

    /// Latest reference price for a symbol. The paper simulator fills
    /// market orders at this price; a real venue prices its own fills.
    fn set_reference_price(&mut self, _symbol: &str, _price: f64) {}

    /// Realized PnL from a closed position. The paper simulator folds it
    /// into its balance; a real venue already did.
    fn apply_realized_pnl(&mut self, _pnl: f64) {}

    fn name(&self) -> &str;
}
