// nexus_exchange/src/trader.rs
//
// The Trader ledger.
//
// A trader exists for the full session; only fills mutate its ledger. No
// back-pointers to orders — lookups from trader to order go through the
// book's `by_trader` index instead, so there is no cycle to keep consistent.

use crate::types::{Price, Side, TraderId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How many past fills a trader's ledger remembers. Bounded so a long
/// session doesn't grow the snapshot without limit.
pub const FILL_HISTORY_CAPACITY: usize = 64;

/// One historical fill, from this trader's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRecord {
    pub side: Side,
    pub price: Price,
    pub qty: u32,
    pub tick: u64,
    pub was_maker: bool,
}

/// A trader's running ledger. Cash and P&L are fixed-point (scaled by
/// `SCALE`); position is signed raw quantity (positive = long).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trader {
    pub trader_id: TraderId,
    pub cash: i64,
    pub position: i64,
    pub vwap: Price,
    pub realized_pnl: i64,
    pub toxicity: f64,
    fills: VecDeque<FillRecord>,
}

impl Trader {
    pub fn new(trader_id: TraderId, starting_cash: i64) -> Self {
        Self {
            trader_id,
            cash: starting_cash,
            position: 0,
            vwap: Price::new(0),
            realized_pnl: 0,
            toxicity: 0.0,
            fills: VecDeque::with_capacity(FILL_HISTORY_CAPACITY),
        }
    }

    /// Apply one fill to this trader's ledger. `side` is the side the
    /// trader itself traded on (buy increases position, sell decreases).
    pub fn apply_fill(&mut self, side: Side, price: Price, qty: u32, tick: u64, was_maker: bool) {
        let signed_qty = side.sign() * qty as i64;
        let notional = price.notional(qty);
        let position_before = self.position;

        match side {
            Side::Bid => self.cash -= notional,
            Side::Ask => self.cash += notional,
        }

        let same_direction =
            position_before == 0 || (side == Side::Bid) == (position_before > 0);

        if same_direction {
            let old_qty = position_before.unsigned_abs() as u32;
            self.vwap = Price::weighted_avg(&self.vwap, old_qty, &price, qty);
        } else {
            let old_qty = position_before.unsigned_abs() as u32;
            self.realize_closing_pnl(price, qty.min(old_qty));
            // A fill larger than the open position flips through zero; the
            // residual leg opens a fresh position at this fill's price, not
            // the stale average of the side that just closed out.
            if qty > old_qty {
                self.vwap = price;
            }
        }

        self.position += signed_qty;
        if self.position == 0 {
            self.vwap = Price::new(0);
        }

        self.record_fill(FillRecord { side, price, qty, tick, was_maker });
    }

    fn realize_closing_pnl(&mut self, fill_price: Price, closing_qty: u32) {
        if closing_qty == 0 {
            return;
        }
        let entry_notional = self.vwap.notional(closing_qty);
        let exit_notional = fill_price.notional(closing_qty);
        // Long position closed by a sell: pnl = exit - entry.
        // Short position closed by a buy: pnl = entry - exit.
        let pnl = if self.position > 0 {
            exit_notional - entry_notional
        } else {
            entry_notional - exit_notional
        };
        self.realized_pnl += pnl;
    }

    fn record_fill(&mut self, record: FillRecord) {
        if self.fills.len() == FILL_HISTORY_CAPACITY {
            self.fills.pop_front();
        }
        self.fills.push_back(record);
    }

    pub fn recent_fills(&self) -> impl Iterator<Item = &FillRecord> {
        self.fills.iter()
    }

    /// Unrealized P&L marked against `mid`.
    pub fn unrealized_pnl(&self, mid: Price) -> i64 {
        if self.position == 0 {
            return 0;
        }
        let mark_notional = mid.notional(self.position.unsigned_abs() as u32);
        let entry_notional = self.vwap.notional(self.position.unsigned_abs() as u32);
        if self.position > 0 {
            mark_notional - entry_notional
        } else {
            entry_notional - mark_notional
        }
    }

    pub fn total_pnl(&self, mid: Price) -> i64 {
        self.realized_pnl + self.unrealized_pnl(mid)
    }

    /// Update the EWMA toxicity score: `t <- (1-a)*t + a*1[adverse]`.
    pub fn update_toxicity(&mut self, alpha: f64, adverse: bool) {
        let indicator = if adverse { 1.0 } else { 0.0 };
        self.toxicity = (1.0 - alpha) * self.toxicity + alpha * indicator;
    }
}
