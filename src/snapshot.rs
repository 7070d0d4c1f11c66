// nexus_exchange/src/snapshot.rs
//
// MarketSnapshot — the immutable, per-tick view handed to subscribers
// (bots read it via `bots::View`; the CLI prints it; the journal records
// it). Never mutated after construction.

use crate::types::{Price, Side, TraderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePrint {
    pub price: Price,
    pub qty: u32,
    pub aggressor_side: Side,
    pub tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderView {
    pub trader_id: TraderId,
    pub position: i64,
    pub realized_pnl: i64,
    pub unrealized_pnl: i64,
    pub toxicity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub tick: u64,
    pub bids: Vec<(Price, u32)>,
    pub asks: Vec<(Price, u32)>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub mid: Option<Price>,
    pub last_trade: Option<TradePrint>,
    pub fair_value: Price,
    pub uncertainty: f64,
    pub volatility: f64,
    pub traders: Vec<TraderView>,
    /// Populated only when an unrecoverable invariant violation was
    /// detected this tick; the simulator stops ticking once this is set.
    pub fatal: Option<String>,
}
