// nexus_exchange/src/types/order.rs
//
// The Order type. Immutable after placement except for `remaining_qty`,
// which only the matching engine decrements.

use super::{Price, Quantity, Side};
use serde::{Deserialize, Serialize};

pub type OrderId = u64;
pub type TraderId = u32;

/// Time-in-force: how long an order is willing to rest in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled: rests until explicitly cancelled or `expires_at`.
    Gtc,
    /// Immediate-or-cancel: any unfilled remainder is dropped at tick end,
    /// never rests across a tick boundary.
    Ioc,
}

/// A single resting or incoming order.
///
/// `order_id` is assigned by the book on insert and is monotonic within one
/// simulator instance. `timestamp` is the tick at which the order was
/// inserted; combined with `order_id` it gives the strict FIFO ordering
/// within a price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub trader_id: TraderId,
    pub side: Side,
    pub price: Price,
    pub original_qty: Quantity,
    pub remaining_qty: Quantity,
    pub timestamp: u64,
    pub time_in_force: TimeInForce,
    pub expires_at: u64,
}

impl Order {
    /// Construct a new order with `remaining_qty == original_qty`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        trader_id: TraderId,
        side: Side,
        price: Price,
        qty: Quantity,
        timestamp: u64,
        time_in_force: TimeInForce,
        expires_at: u64,
    ) -> Self {
        Self {
            order_id,
            trader_id,
            side,
            price,
            original_qty: qty,
            remaining_qty: qty,
            timestamp,
            time_in_force,
            expires_at,
        }
    }

    /// Ordering key used for FIFO priority within a price level: strictly
    /// ascending `(timestamp, order_id)`.
    pub fn priority_key(&self) -> (u64, OrderId) {
        (self.timestamp, self.order_id)
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_qty.is_zero()
    }

    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.time_in_force, TimeInForce::Gtc) && self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(ts: u64, id: OrderId) -> Order {
        Order::new(
            id,
            1,
            Side::Bid,
            Price::from_str_decimal("100.00").unwrap(),
            Quantity::new(10),
            ts,
            TimeInForce::Gtc,
            ts + 100,
        )
    }

    #[test]
    fn priority_key_orders_by_timestamp_then_id() {
        let a = order(1, 5);
        let b = order(1, 6);
        let c = order(2, 1);
        assert!(a.priority_key() < b.priority_key());
        assert!(b.priority_key() < c.priority_key());
    }

    #[test]
    fn new_order_starts_unfilled_with_full_remaining() {
        let o = order(0, 1);
        assert_eq!(o.remaining_qty, o.original_qty);
        assert!(!o.is_filled());
    }

    #[test]
    fn expiry_only_applies_to_gtc() {
        let mut o = order(0, 1);
        assert!(o.is_expired(100));
        o.time_in_force = TimeInForce::Ioc;
        assert!(!o.is_expired(100));
    }
}
