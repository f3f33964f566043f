use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::BotError;
use crate::models::{Direction, Order, OrderSide, OrderStatus, Position};

/// A position removed by a stop/close, with its realized PnL.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub position: Position,
    pub exit_price: f64,
    pub pnl: f64,
}

/// Owns the set of open positions and their trailing-stop state.
///
/// Multiple concurrent positions per symbol are permitted. No other
/// component mutates positions; everything goes through these operations.
#[derive(Default)]
pub struct PositionManager {
    positions: HashMap<Uuid, Position>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot at startup.
    pub fn restore(positions: Vec<Position>) -> Self {
        tracing::info!(count = positions.len(), "restored positions from snapshot");
        Self {
            positions: positions.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    pub fn add_position(&mut self, position: Position) -> Uuid {
        let id = position.id;
        self.positions.insert(id, position);
        id
    }

    pub fn remove_position(&mut self, id: Uuid) -> Option<Position> {
        self.positions.remove(&id)
    }

    pub fn positions_for_symbol(&self, symbol: &str) -> Vec<&Position> {
        let mut found: Vec<&Position> = self
            .positions
            .values()
            .filter(|p| p.symbol == symbol)
            .collect();
        found.sort_by_key(|p| (p.entry_time, p.id));
        found
    }

    /// All open positions, ordered by entry time for deterministic
    /// iteration and snapshots.
    pub fn open_positions(&self) -> Vec<&Position> {
        let mut all: Vec<&Position> = self.positions.values().collect();
        all.sort_by_key(|p| (p.entry_time, p.id));
        all
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Snapshot of all open positions for the persistence collaborator.
    pub fn snapshot(&self) -> Vec<Position> {
        self.open_positions().into_iter().cloned().collect()
    }

    /// Convert a filled order into an open position.
    ///
    /// The trailing stop activates once price has moved one initial risk
    /// distance in the position's favor.
    pub fn open_from_fill(
        &mut self,
        order: &Order,
        stop_loss_price: f64,
        now: DateTime<Utc>,
    ) -> crate::Result<Uuid> {
        if order.status != OrderStatus::Filled {
            return Err(BotError::Position(format!(
                "cannot open position from order {} in status {:?}",
                order.client_order_id, order.status
            )));
        }
        let entry_price = order.avg_fill_price.ok_or_else(|| {
            BotError::Position(format!(
                "filled order {} has no average fill price",
                order.client_order_id
            ))
        })?;
        if order.filled_quantity <= 0.0 {
            return Err(BotError::Position(format!(
                "filled order {} has non-positive quantity",
                order.client_order_id
            )));
        }

        let direction = match order.side {
            OrderSide::Buy => Direction::Long,
            OrderSide::Sell => Direction::Short,
        };
        let risk_distance = (entry_price - stop_loss_price).abs();
        let activation_price = entry_price + direction.sign() * risk_distance;

        let position = Position {
            id: Uuid::new_v4(),
            symbol: order.symbol.clone(),
            direction,
            entry_price,
            quantity: order.filled_quantity,
            stop_loss_price,
            trailing_stop_price: None,
            activation_price,
            entry_time: now,
        };

        tracing::info!(
            symbol = %position.symbol,
            ?direction,
            entry_price,
            quantity = position.quantity,
            stop_loss_price,
            activation_price,
            "position opened"
        );

        Ok(self.add_position(position))
    }

    /// The stop that actually applies: the more conservative of the static
    /// stop-loss and the current trailing stop.
    pub fn effective_stop(position: &Position) -> f64 {
        match (position.direction, position.trailing_stop_price) {
            (Direction::Long, Some(trailing)) => position.stop_loss_price.max(trailing),
            (Direction::Short, Some(trailing)) => position.stop_loss_price.min(trailing),
            (_, None) => position.stop_loss_price,
        }
    }

    /// Recompute trailing stops for every position on `symbol` at the given
    /// price. A stored trailing stop is replaced only when the candidate
    /// tightens risk; it never loosens. Returns true when any stop moved,
    /// so the caller knows the state needs persisting.
    pub fn update_trailing_stops(&mut self, symbol: &str, price: f64) -> bool {
        let mut moved = false;
        for position in self
            .positions
            .values_mut()
            .filter(|p| p.symbol == symbol)
        {
            let risk_distance = position.initial_risk_distance();
            if risk_distance <= 0.0 {
                continue;
            }

            let activated = match position.direction {
                Direction::Long => price >= position.activation_price,
                Direction::Short => price <= position.activation_price,
            };
            if !activated {
                continue;
            }

            let candidate = price - position.direction.sign() * risk_distance;
            let tightens = match (position.direction, position.trailing_stop_price) {
                (_, None) => true,
                (Direction::Long, Some(current)) => candidate > current,
                (Direction::Short, Some(current)) => candidate < current,
            };

            if tightens {
                tracing::debug!(
                    symbol = %position.symbol,
                    previous = ?position.trailing_stop_price,
                    candidate,
                    "trailing stop tightened"
                );
                position.trailing_stop_price = Some(candidate);
                moved = true;
            }
        }
        moved
    }

    /// Remove every position on `symbol` whose effective stop is crossed by
    /// `price`, returning the resulting closed trades.
    pub fn check_exits(&mut self, symbol: &str, price: f64) -> Vec<ClosedTrade> {
        let mut hit: Vec<Uuid> = self
            .positions
            .values()
            .filter(|p| p.symbol == symbol)
            .filter(|p| {
                let stop = Self::effective_stop(p);
                match p.direction {
                    Direction::Long => price <= stop,
                    Direction::Short => price >= stop,
                }
            })
            .map(|p| p.id)
            .collect();
        hit.sort();

        hit.into_iter()
            .filter_map(|id| self.remove_position(id))
            .map(|position| {
                let pnl = (price - position.entry_price)
                    * position.quantity
                    * position.direction.sign();
                tracing::info!(
                    symbol = %position.symbol,
                    direction = ?position.direction,
                    entry = position.entry_price,
                    exit = price,
                    pnl,
                    "position closed by stop"
                );
                ClosedTrade {
                    position,
                    exit_price: price,
                    pnl,
                }
            })
            .collect()
    }

    /// Close every position on `symbol` at `price` regardless of stops
    /// (strategy-driven ClosePosition signal or shutdown).
    pub fn close_all_for_symbol(&mut self, symbol: &str, price: f64) -> Vec<ClosedTrade> {
        let ids: Vec<Uuid> = self
            .positions_for_symbol(symbol)
            .iter()
            .map(|p| p.id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.remove_position(id))
            .map(|position| {
                let pnl = (price - position.entry_price)
                    * position.quantity
                    * position.direction.sign();
                ClosedTrade {
                    position,
                    exit_price: price,
                    pnl,
                }
            })
            .collect()
    }
}
