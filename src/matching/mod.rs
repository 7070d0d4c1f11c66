// nexus_exchange/src/matching/mod.rs
//
// The Matching Engine.
//
// Pure over its inputs: given the same book contents and the same `now`,
// `run` produces the same event sequence every time. It owns no state of
// its own — no trade counters, no clocks — so replay never has to worry
// about engine-internal drift.
//
// Algorithm: repeatedly cross best bid against best ask with price-time
// priority, self-trade prevention, and maker/taker attribution by
// `(timestamp, order_id)`.

use crate::book::OrderBook;
use crate::types::{OrderId, Price, Quantity, Side, TraderId};
use serde::{Deserialize, Serialize};

/// A single resolved trade. `tick` is the label, not a timing mechanism —
/// the engine does not advance time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_trader_id: TraderId,
    pub taker_trader_id: TraderId,
    pub price: Price,
    pub qty: Quantity,
    pub aggressor_side: Side,
    pub tick: u64,
}

#[derive(Debug, Default)]
pub struct MatchingEngine;

impl MatchingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Resolve every crossed price pair in `book` at this instant, labeling
    /// emitted events with `now`. Loops until `best_bid < best_ask` or one
    /// side empties, per the book-consistency invariant.
    pub fn run(&self, book: &mut OrderBook, now: u64) -> Vec<MatchEvent> {
        let mut events = Vec::new();

        loop {
            let (Some(bid_price), Some(ask_price)) = (book.best_bid(), book.best_ask()) else {
                break;
            };
            if bid_price < ask_price {
                break;
            }

            let bid_head = book
                .level_mut(Side::Bid, bid_price)
                .and_then(|l| l.front())
                .copied();
            let ask_head = book
                .level_mut(Side::Ask, ask_price)
                .and_then(|l| l.front())
                .copied();
            let (Some(bo), Some(ao)) = (bid_head, ask_head) else {
                break;
            };

            // Self-trade prevention: drop the newer of the two orders and
            // retry without emitting an event.
            if bo.trader_id == ao.trader_id {
                let newer = if bo.priority_key() > ao.priority_key() {
                    (Side::Bid, bid_price, bo.order_id)
                } else {
                    (Side::Ask, ask_price, ao.order_id)
                };
                let (side, price, order_id) = newer;
                let full_qty = if side == Side::Bid { bo.remaining_qty } else { ao.remaining_qty };
                book.apply_fill(side, price, order_id, full_qty);
                continue;
            }

            // Maker = smaller (timestamp, order_id); taker = the other.
            let (maker, maker_side, maker_price, taker, aggressor_side) =
                if bo.priority_key() < ao.priority_key() {
                    (bo, Side::Bid, bid_price, ao, Side::Ask)
                } else {
                    (ao, Side::Ask, ask_price, bo, Side::Bid)
                };
            let taker_side = maker_side.opposite();
            let taker_price = if taker_side == Side::Bid { bid_price } else { ask_price };

            let fill_qty_raw = bo.remaining_qty.raw().min(ao.remaining_qty.raw());
            let fill_qty = Quantity::new(fill_qty_raw);

            book.apply_fill(maker_side, maker_price, maker.order_id, fill_qty);
            book.apply_fill(taker_side, taker_price, taker.order_id, fill_qty);
            book.last_trade_price = Some(maker_price);

            events.push(MatchEvent {
                maker_order_id: maker.order_id,
                taker_order_id: taker.order_id,
                maker_trader_id: maker.trader_id,
                taker_trader_id: taker.trader_id,
                price: maker_price,
                qty: fill_qty,
                aggressor_side,
                tick: now,
            });
        }

        events
    }
}
