// nexus_exchange/src/book/mod.rs
//
// The Order Book.
//
// Two BTreeMaps keyed by price give O(log N) price discovery; within a
// level, a VecDeque gives O(1) FIFO push/pop. Two side indices (`by_id`,
// `by_trader`) keep cancel and cancel-all O(1) amortized instead of a full
// book scan.
//
// This module is deliberately mechanical: it knows nothing about matching,
// risk, or ticks other than the `now` value it is told to expire against.
// `MatchingEngine` (see `crate::matching`) is the only thing allowed to
// mutate `remaining_qty`.

use crate::types::{Order, OrderId, Price, Quantity, Side, TimeInForce, TraderId};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Errors returned by book operations. Distinct from risk rejections — these
/// are invariant violations at the book layer, not trading decisions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookError {
    #[error("order id {0} already present in the book")]
    DuplicateOrderId(OrderId),
    #[error("order id {0} not found")]
    NotFound(OrderId),
}

/// One price level: a FIFO queue of orders plus a cached aggregate quantity
/// so depth snapshots don't have to walk the queue.
#[derive(Debug, Default, Clone)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
    total_qty: u64,
}

impl PriceLevel {
    fn push_back(&mut self, order: Order) {
        self.total_qty += order.remaining_qty.raw() as u64;
        self.orders.push_back(order);
    }

    fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    pub fn total_qty(&self) -> u64 {
        self.total_qty
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }
}

/// `(side, price, trader_id)` — enough to locate and remove an order by id
/// without scanning either book side.
type IndexEntry = (Side, Price, TraderId);

#[derive(Debug, Default)]
pub struct OrderBook {
    pub bids: BTreeMap<Price, PriceLevel>,
    pub asks: BTreeMap<Price, PriceLevel>,
    by_id: HashMap<OrderId, IndexEntry>,
    by_trader: HashMap<TraderId, HashSet<OrderId>>,
    next_order_id: OrderId,
    pub last_trade_price: Option<Price>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next monotonic order id.
    pub fn next_order_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        self.next_order_id
    }

    fn side_map_mut(&mut self, side: Side) -> &mut BTreeMap<Price, PriceLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    fn side_map(&self, side: Side) -> &BTreeMap<Price, PriceLevel> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Insert a brand-new order. Precondition: `remaining_qty == original_qty`
    /// and `order_id` is not already present — both are caller invariants
    /// (the caller mints `order_id` via `next_order_id`), so violation here
    /// indicates a bug upstream rather than a user-facing rejection.
    pub fn insert(&mut self, order: Order) -> Result<(), BookError> {
        if self.by_id.contains_key(&order.order_id) {
            return Err(BookError::DuplicateOrderId(order.order_id));
        }
        debug_assert_eq!(order.remaining_qty, order.original_qty);

        let side = order.side;
        let price = order.price;
        let trader_id = order.trader_id;
        let order_id = order.order_id;

        self.side_map_mut(side).entry(price).or_default().push_back(order);
        self.by_id.insert(order_id, (side, price, trader_id));
        self.by_trader.entry(trader_id).or_default().insert(order_id);
        Ok(())
    }

    /// Remove an order by id. Cleans up an empty level and both indices.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<Order, BookError> {
        let (side, price, trader_id) = self
            .by_id
            .remove(&order_id)
            .ok_or(BookError::NotFound(order_id))?;

        let removed = self.remove_from_level(side, price, order_id);

        if let Some(set) = self.by_trader.get_mut(&trader_id) {
            set.remove(&order_id);
            if set.is_empty() {
                self.by_trader.remove(&trader_id);
            }
        }

        removed.ok_or(BookError::NotFound(order_id))
    }

    fn remove_from_level(&mut self, side: Side, price: Price, order_id: OrderId) -> Option<Order> {
        let map = self.side_map_mut(side);
        let level = map.get_mut(&price)?;
        let pos = level.orders.iter().position(|o| o.order_id == order_id)?;
        let removed = level.orders.remove(pos)?;
        level.total_qty -= removed.remaining_qty.raw() as u64;
        if level.is_empty() {
            map.remove(&price);
        }
        Some(removed)
    }

    /// Cancel every resting order belonging to `trader_id`. Returns the
    /// cancelled order ids.
    pub fn cancel_all(&mut self, trader_id: TraderId) -> Vec<OrderId> {
        let ids: Vec<OrderId> = self
            .by_trader
            .get(&trader_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        for id in &ids {
            let _ = self.cancel(*id);
        }
        ids
    }

    /// Remove every GTC order whose `expires_at <= now`. IOC orders are never
    /// expired here — the simulator sweeps them at tick end instead.
    pub fn expire(&mut self, now: u64) -> Vec<OrderId> {
        let mut stale = Vec::new();
        for (side, map) in [(Side::Bid, &self.bids), (Side::Ask, &self.asks)] {
            for level in map.values() {
                for order in level.orders.iter() {
                    if matches!(order.time_in_force, TimeInForce::Gtc) && order.expires_at <= now {
                        stale.push((side, order.order_id));
                    }
                }
            }
        }
        let ids: Vec<OrderId> = stale.iter().map(|(_, id)| *id).collect();
        for (_, id) in stale {
            let _ = self.cancel(id);
        }
        ids
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    /// Mid of best bid/ask. `None` if either side is empty.
    pub fn mid(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(b.midpoint(&a)),
            _ => None,
        }
    }

    /// Aggregate resting quantity on one side (used by risk concentration
    /// checks against the opposite side).
    pub fn total_depth(&self, side: Side) -> u64 {
        self.side_map(side).values().map(PriceLevel::total_qty).sum()
    }

    /// Top-`n` levels per side: bids descending, asks ascending, each an
    /// aggregate `(price, qty)` pair.
    pub fn depth(&self, n: usize) -> (Vec<(Price, Quantity)>, Vec<(Price, Quantity)>) {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(n)
            .map(|(p, l)| (*p, Quantity::new(l.total_qty() as u32)))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(n)
            .map(|(p, l)| (*p, Quantity::new(l.total_qty() as u32)))
            .collect();
        (bids, asks)
    }

    pub fn level_mut(&mut self, side: Side, price: Price) -> Option<&mut PriceLevel> {
        self.side_map_mut(side).get_mut(&price)
    }

    pub fn remove_price_if_empty(&mut self, side: Side, price: Price) {
        let map = self.side_map_mut(side);
        if map.get(&price).is_some_and(PriceLevel::is_empty) {
            map.remove(&price);
        }
    }

    /// Decrement the front order of `(side, price)` by `fill_qty`, removing
    /// it (and the level, and both indices) if it reaches zero. The caller
    /// (the matching engine) is responsible for always filling from the
    /// front of the level, preserving FIFO order.
    pub fn apply_fill(&mut self, side: Side, price: Price, order_id: OrderId, fill_qty: Quantity) {
        let map = self.side_map_mut(side);
        let Some(level) = map.get_mut(&price) else { return };
        let Some(front) = level.orders.front_mut() else { return };
        debug_assert_eq!(front.order_id, order_id);
        front.remaining_qty = Quantity::new(front.remaining_qty.raw() - fill_qty.raw());
        level.total_qty -= fill_qty.raw() as u64;

        if front.remaining_qty.is_zero() {
            let trader_id = front.trader_id;
            level.orders.pop_front();
            self.by_id.remove(&order_id);
            if let Some(set) = self.by_trader.get_mut(&trader_id) {
                set.remove(&order_id);
                if set.is_empty() {
                    self.by_trader.remove(&trader_id);
                }
            }
        }
        if level.is_empty() {
            map.remove(&price);
        }
    }

    pub fn by_id_contains(&self, order_id: OrderId) -> bool {
        self.by_id.contains_key(&order_id)
    }

    pub fn orders_for_trader(&self, trader_id: TraderId) -> Vec<OrderId> {
        self.by_trader
            .get(&trader_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeInForce;

    fn px(s: &str) -> Price {
        Price::from_str_decimal(s).unwrap()
    }

    fn mk(id: OrderId, trader: TraderId, side: Side, price: Price, qty: u32, ts: u64) -> Order {
        Order::new(id, trader, side, price, Quantity::new(qty), ts, TimeInForce::Gtc, ts + 1000)
    }

    #[test]
    fn insert_and_best_prices() {
        let mut book = OrderBook::new();
        book.insert(mk(1, 1, Side::Bid, px("99.00"), 10, 0)).unwrap();
        book.insert(mk(2, 2, Side::Ask, px("101.00"), 10, 0)).unwrap();
        assert_eq!(book.best_bid(), Some(px("99.00")));
        assert_eq!(book.best_ask(), Some(px("101.00")));
        assert_eq!(book.mid(), Some(px("100.00")));
    }

    #[test]
    fn duplicate_order_id_rejected() {
        let mut book = OrderBook::new();
        book.insert(mk(1, 1, Side::Bid, px("100.00"), 10, 0)).unwrap();
        let err = book.insert(mk(1, 1, Side::Bid, px("100.00"), 10, 0));
        assert_eq!(err, Err(BookError::DuplicateOrderId(1)));
    }

    #[test]
    fn cancel_removes_order_and_empty_level() {
        let mut book = OrderBook::new();
        book.insert(mk(1, 1, Side::Bid, px("100.00"), 10, 0)).unwrap();
        let cancelled = book.cancel(1).unwrap();
        assert_eq!(cancelled.order_id, 1);
        assert_eq!(book.best_bid(), None);
        assert!(!book.by_id_contains(1));
    }

    #[test]
    fn cancel_all_clears_every_order_for_trader() {
        let mut book = OrderBook::new();
        book.insert(mk(1, 1, Side::Bid, px("100.00"), 10, 0)).unwrap();
        book.insert(mk(2, 1, Side::Ask, px("101.00"), 10, 0)).unwrap();
        book.insert(mk(3, 2, Side::Bid, px("99.00"), 10, 0)).unwrap();
        let cancelled = book.cancel_all(1);
        assert_eq!(cancelled.len(), 2);
        assert_eq!(book.best_bid(), Some(px("99.00")));
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn expire_removes_only_stale_gtc_orders() {
        let mut book = OrderBook::new();
        let mut gtc = mk(1, 1, Side::Bid, px("100.00"), 10, 0);
        gtc.expires_at = 2;
        book.insert(gtc).unwrap();
        let mut ioc = mk(2, 2, Side::Ask, px("101.00"), 10, 0);
        ioc.time_in_force = TimeInForce::Ioc;
        ioc.expires_at = 0;
        book.insert(ioc).unwrap();

        let expired = book.expire(5);
        assert_eq!(expired, vec![1]);
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), Some(px("101.00")));
    }

    #[test]
    fn depth_reports_aggregate_qty_descending_ascending() {
        let mut book = OrderBook::new();
        book.insert(mk(1, 1, Side::Bid, px("99.00"), 10, 0)).unwrap();
        book.insert(mk(2, 1, Side::Bid, px("100.00"), 5, 0)).unwrap();
        book.insert(mk(3, 2, Side::Ask, px("101.00"), 7, 0)).unwrap();
        let (bids, asks) = book.depth(5);
        assert_eq!(bids[0].0, px("100.00"));
        assert_eq!(bids[1].0, px("99.00"));
        assert_eq!(asks[0].0, px("101.00"));
    }
}
