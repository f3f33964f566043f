use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BotError;
use crate::execution::adapter::ExecutionAdapter;
use crate::models::{Order, OrderRequest, OrderStatus, OrderType};

/// In-memory execution simulator. Market orders fill immediately and in
/// full at the most recent mark price for the symbol; limit orders rest
/// as Submitted.
pub struct PaperAdapter {
    balance: f64,
    mark_prices: HashMap<String, f64>,
    resting: HashMap<String, Order>,
    fill_history: Vec<Order>,
    latency: Duration,
}

impl PaperAdapter {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            mark_prices: HashMap::new(),
            resting: HashMap::new(),
            fill_history: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    /// Simulated round-trip latency applied to each submission.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Update the simulated market price used to fill subsequent orders.
    pub fn set_mark_price(&mut self, symbol: &str, price: f64) {
        self.mark_prices.insert(symbol.to_string(), price);
    }

    pub fn fill_history(&self) -> &[Order] {
        &self.fill_history
    }
}

#[async_trait]
impl ExecutionAdapter for PaperAdapter {
    async fn submit_order(&mut self, request: OrderRequest) -> crate::Result<Order> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let price = *self.mark_prices.get(&request.symbol).ok_or_else(|| {
            BotError::Execution(format!("no mark price for {}", request.symbol))
        })?;

        let mut order = Order::new(request);
        order.transition(OrderStatus::Submitted)?;

        match order.order_type {
            OrderType::Market => {
                order.record_fill(order.quantity, price)?;
                tracing::info!(
                    symbol = %order.symbol,
                    side = ?order.side,
                    quantity = order.quantity,
                    fill_price = price,
                    "paper order filled"
                );
                self.fill_history.push(order.clone());
            }
            OrderType::Limit => {
                self.resting
                    .insert(order.client_order_id.clone(), order.clone());
            }
        }

        Ok(order)
    }

    async fn cancel_order(&mut self, order: &Order) -> crate::Result<Order> {
        let mut resting = self.resting.remove(&order.client_order_id).ok_or_else(|| {
            BotError::Execution(format!(
                "paper order {} is not resting, cannot cancel",
                order.client_order_id
            ))
        })?;
        resting.transition(OrderStatus::Canceled)?;
        Ok(resting)
    }

    async fn get_order_status(&self, client_order_id: &str) -> crate::Result<Option<Order>> {
        if let Some(order) = self.resting.get(client_order_id) {
            return Ok(Some(order.clone()));
        }
        Ok(self
            .fill_history
            .iter()
            .rev()
            .find(|o| o.client_order_id == client_order_id)
            .cloned())
    }

    async fn open_orders(&self) -> crate::Result<Vec<Order>> {
        let mut open: Vec<Order> = self.resting.values().cloned().collect();
        open.sort_by(|a, b| a.client_order_id.cmp(&b.client_order_id));
        Ok(open)
    }

    async fn get_balance(&self) -> crate::Result<f64> {
        Ok(self.balance)
    }

    fn set_reference_price(&mut self, symbol: &str, price: f64) {
        self.set_mark_price(symbol, price);
    }

    fn apply_realized_pnl(&mut self, pnl: f64) {
        self.balance = (self.balance + pnl).max(0.0);
    }

    fn name(&self) -> &str {
        "paper"
    }
}
