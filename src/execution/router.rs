use std::collections::{HashMap, HashSet};

use crate::error::BotError;
use crate::execution::adapter::ExecutionAdapter;
use crate::models::{Order, OrderRequest};

/// Routes order flow through whichever adapter was injected at
/// construction. Owns every order it submits until the order reaches a
/// terminal status.
pub struct ExecutionRouter {
    adapter: Box<dyn ExecutionAdapter>,
    pending: HashMap<String, Order>,
}

impl ExecutionRouter {
    pub fn new(adapter: Box<dyn ExecutionAdapter>) -> Self {
        Self {
            adapter,
            pending: HashMap::new(),
        }
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    pub fn set_reference_price(&mut self, symbol: &str, price: f64) {
        self.adapter.set_reference_price(symbol, price);
    }

    pub fn apply_realized_pnl(&mut self, pnl: f64) {
        self.adapter.apply_realized_pnl(pnl);
    }

    pub async fn get_balance(&self) -> crate::Result<f64> {
        self.adapter.get_balance().await
    }

    /// Client order ids this router is aware of: orders still pending on
    /// the venue. Fed into reconciliation at startup.
    pub fn known_order_ids(&self) -> HashSet<String> {
        self.pending.keys().cloned().collect()
    }

    /// Submit an order through the active adapter. Non-terminal results
    /// stay tracked here until canceled or filled.
    pub async fn submit(&mut self, request: OrderRequest) -> crate::Result<Order> {
        let order = self.adapter.submit_order(request).await?;
        if !order.status.is_terminal() {
            self.pending
                .insert(order.client_order_id.clone(), order.clone());
        }
        Ok(order)
    }

    /// Latest known state of an order: the adapter's view when it still
    /// knows the id, otherwise our locally tracked pending copy.
    pub async fn get_order_status(&self, client_order_id: &str) -> crate::Result<Option<Order>> {
        if let Some(order) = self.adapter.get_order_status(client_order_id).await? {
            return Ok(Some(order));
        }
        Ok(self.pending.get(client_order_id).cloned())
    }

    /// Cancel a pending order by client order id.
    pub async fn cancel(&mut self, client_order_id: &str) -> crate::Result<Order> {
        let order = self.pending.get(client_order_id).cloned().ok_or_else(|| {
            BotError::Execution(format!("unknown pending order {client_order_id}"))
        })?;
        let canceled = self.adapter.cancel_order(&order).await?;
        self.pending.remove(client_order_id);
        Ok(canceled)
    }

    /// Compare venue-open orders against locally known client order ids.
    /// Any order the venue holds that we do not recognize is an orphan:
    /// logged, returned to the operator, and never adopted or canceled
    /// automatically.
    pub async fn reconcile_on_startup(
        &self,
        known: &HashSet<String>,
    ) -> crate::Result<Vec<Order>> {
        let venue_open = self.adapter.open_orders().await?;
        let mut orphans = Vec::new();

        for order in venue_open {
            if known.contains(&order.client_order_id) {
                tracing::debug!(
                    client_order_id = %order.client_order_id,
                    "reconciliation matched known order"
                );
            } else {
                let warning = BotError::Reconciliation(format!(
                    "venue holds unknown order {} ({}) on {}",
                    order.client_order_id,
                    order.exchange_id.as_deref().unwrap_or("no exchange id"),
                    order.symbol
                ));
                tracing::warn!(%warning, "leaving orphan order untouched");
                orphans.push(order);
            }
        }

        if orphans.is_empty() {
            tracing::info!("startup reconciliation clean");
        }
        Ok(orphans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::paper::PaperAdapter;
    use crate::models::{OrderSide, OrderStatus, OrderType};

    fn paper_router() -> ExecutionRouter {
        let mut adapter = PaperAdapter::new(10_000.0);
        adapter.set_mark_price("BTCUSDT", 50_000.0);
        ExecutionRouter::new(Box::new(adapter))
    }

    fn market_request() -> OrderRequest {
        OrderRequest {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            quantity: 0.1,
            order_type: OrderType::Market,
        }
    }

    #[tokio::test]
    async fn test_terminal_orders_are_not_tracked() {
        let mut router = paper_router();
        let order = router.submit(market_request()).await.unwrap();

        assert_eq!(order.status, OrderStatus::Filled);
        assert!(router.known_order_ids().is_empty());
    }

    #[tokio::test]
    async fn test_resting_order_is_tracked_until_cancel() {
        let mut router = paper_router();
        let order = router
            .submit(OrderRequest {
                order_type: OrderType::Limit,
                ..market_request()
            })
            .await
            .unwrap();

        assert!(router.known_order_ids().contains(&order.client_order_id));

        let canceled = router.cancel(&order.client_order_id).await.unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert!(router.known_order_ids().is_empty());
    }

    #[tokio::test]
    async fn test_order_status_survives_terminal_fills() {
        let mut router = paper_router();
        let filled = router.submit(market_request()).await.unwrap();
        let resting = router
            .submit(OrderRequest {
                order_type: OrderType::Limit,
                ..market_request()
            })
            .await
            .unwrap();

        // Filled orders leave the pending map but remain queryable
        let found = router
            .get_order_status(&filled.client_order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, OrderStatus::Filled);

        let found = router
            .get_order_status(&resting.client_order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, OrderStatus::Submitted);

        assert!(router.get_order_status("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_fails() {
        let mut router = paper_router();
        assert!(router.cancel("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_reconciliation_reports_orphans() {
        let mut router = paper_router();
        let resting = router
            .submit(OrderRequest {
                order_type: OrderType::Limit,
                ..market_request()
            })
            .await
            .unwrap();

        // Venue knows about the resting order; we pretend we do not.
        let orphans = router.reconcile_on_startup(&HashSet::new()).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].client_order_id, resting.client_order_id);

        // With the id known, reconciliation is clean.
        let known = router.known_order_ids();
        assert!(router.reconcile_on_startup(&known).await.unwrap().is_empty());
    }
}
