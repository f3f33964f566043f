use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BotError;

/// OHLCV candlestick data. Immutable once produced; the feed owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Absolute size of the candle body (|close - open|).
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

/// Trading signal, produced fresh on every candle close. Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    GoLong,
    GoShort,
    ClosePosition,
    NoTrade,
}

/// Direction of an open position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short. Used to fold direction into PnL math.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

/// Order lifecycle:
/// Created -> Submitted -> { PartiallyFilled -> Filled | Canceled | Rejected | Error }
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Created,
    Submitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Error,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Error
        )
    }
}

/// What a caller asks the execution router to do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
}

/// An order as tracked by the execution router. Owned by the router until it
/// reaches a terminal status; a Filled order is converted into a Position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    /// Minted at creation so a higher layer can retry idempotently.
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub filled_quantity: f64,
    pub avg_fill_price: Option<f64>,
    pub exchange_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(request: OrderRequest) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            client_order_id: id.to_string(),
            symbol: request.symbol,
            side: request.side,
            quantity: request.quantity,
            order_type: request.order_type,
            status: OrderStatus::Created,
            filled_quantity: 0.0,
            avg_fill_price: None,
            exchange_id: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Whether moving to `next` is a legal lifecycle transition.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self.status, next),
            (Created, Submitted)
                | (Created, Rejected)
                | (Created, Error)
                | (Submitted, PartiallyFilled)
                | (Submitted, Filled)
                | (Submitted, Canceled)
                | (Submitted, Rejected)
                | (Submitted, Error)
                | (PartiallyFilled, PartiallyFilled)
                | (PartiallyFilled, Filled)
                | (PartiallyFilled, Canceled)
                | (PartiallyFilled, Error)
        )
    }

    pub fn transition(&mut self, next: OrderStatus) -> crate::Result<()> {
        if !self.can_transition_to(next) {
            return Err(BotError::Execution(format!(
                "illegal order transition {:?} -> {:?} for {}",
                self.status, next, self.client_order_id
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Record a (partial) fill. `filled_quantity` can never exceed `quantity`.
    pub fn record_fill(&mut self, quantity: f64, price: f64) -> crate::Result<()> {
        if quantity <= 0.0 {
            return Err(BotError::Execution(format!(
                "non-positive fill quantity {} for {}",
                quantity, self.client_order_id
            )));
        }
        if self.filled_quantity + quantity > self.quantity + f64::EPSILON {
            return Err(BotError::Execution(format!(
                "fill of {} would exceed order quantity {} (already filled {}) for {}",
                quantity, self.quantity, self.filled_quantity, self.client_order_id
            )));
        }

        // Volume-weighted average across partial fills
        let prev_notional = self.avg_fill_price.unwrap_or(0.0) * self.filled_quantity;
        self.filled_quantity += quantity;
        self.avg_fill_price = Some((prev_notional + price * quantity) / self.filled_quantity);

        let next = if self.filled_quantity >= self.quantity - f64::EPSILON {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(next)
    }

    /// Mark the order failed at the adapter boundary. Venue faults map here
    /// instead of propagating.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = OrderStatus::Error;
        self.error = Some(message.into());
    }
}

/// An open position. Exclusively owned by the PositionManager: created on
/// order fill, mutated on every candle close, destroyed on stop-hit/close.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss_price: f64,
    /// Set once price crosses the activation price; only ever tightens.
    pub trailing_stop_price: Option<f64>,
    /// entry +/- initial risk distance, direction-aware.
    pub activation_price: f64,
    pub entry_time: DateTime<Utc>,
}

impl Position {
    /// Distance between entry and the static stop. The unit of R-multiples.
    pub fn initial_risk_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss_price).abs()
    }
}

/// Machine-readable reason why a raw signal was suppressed. Every override
/// must be reportable for audit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VetoReason {
    ExtremeVolatility,
    SentimentBlocksLong,
    SentimentBlocksShort,
    CircuitBreakerActive,
    SizingVeto,
}

impl VetoReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VetoReason::ExtremeVolatility => "extreme_volatility",
            VetoReason::SentimentBlocksLong => "sentiment_blocks_long",
            VetoReason::SentimentBlocksShort => "sentiment_blocks_short",
            VetoReason::CircuitBreakerActive => "circuit_breaker_active",
            VetoReason::SizingVeto => "sizing_veto",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market_buy(quantity: f64) -> Order {
        Order::new(OrderRequest {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            quantity,
            order_type: OrderType::Market,
        })
    }

    #[test]
    fn test_order_lifecycle_happy_path() {
        let mut order = market_buy(2.0);
        assert_eq!(order.status, OrderStatus::Created);

        order.transition(OrderStatus::Submitted).unwrap();
        order.record_fill(1.0, 100.0).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);

        order.record_fill(1.0, 102.0).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_quantity, 2.0);
        assert_eq!(order.avg_fill_price, Some(101.0));
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_order_rejects_illegal_transition() {
        let mut order = market_buy(1.0);
        // Cannot fill an order that was never submitted
        assert!(order.transition(OrderStatus::Filled).is_err());

        order.transition(OrderStatus::Submitted).unwrap();
        order.transition(OrderStatus::Canceled).unwrap();
        assert!(order.transition(OrderStatus::Submitted).is_err());
    }

    #[test]
    fn test_fill_cannot_exceed_order_quantity() {
        let mut order = market_buy(1.0);
        order.transition(OrderStatus::Submitted).unwrap();

        let result = order.record_fill(1.5, 100.0);
        assert!(result.is_err());
        assert_eq!(order.filled_quantity, 0.0);
    }

    #[test]
    fn test_mark_error_is_terminal() {
        let mut order = market_buy(1.0);
        order.mark_error("venue timed out");

        assert_eq!(order.status, OrderStatus::Error);
        assert!(order.status.is_terminal());
        assert_eq!(order.error.as_deref(), Some("venue timed out"));
    }

    #[test]
    fn test_initial_risk_distance() {
        let position = Position {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Short,
            entry_price: 100.0,
            quantity: 1.0,
            stop_loss_price: 105.0,
            trailing_stop_price: None,
            activation_price: 95.0,
            entry_time: Utc::now(),
        };

        assert_eq!(position.initial_risk_distance(), 5.0);
        assert_eq!(position.direction.sign(), -1.0);
    }

    #[test]
    fn test_veto_reason_codes() {
        assert_eq!(VetoReason::ExtremeVolatility.as_str(), "extreme_volatility");
        assert_eq!(
            VetoReason::CircuitBreakerActive.as_str(),
            "circuit_breaker_active"
        );
    }
}
