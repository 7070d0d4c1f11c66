// nexus_exchange/src/risk/mod.rs
//
// The RiskManager.
//
// Pre-trade (`check_order`) runs four ordered checks before an order is
// allowed to touch the book — first failure wins, nothing partially
// applies. Post-tick (`post_tick_check`) runs once per trader per tick
// after matching and may emit a forced-liquidation directive for the
// simulator to inject at the START of the next tick — never the current
// one, so a tick never triggers a second matching pass.

use crate::book::OrderBook;
use crate::trader::Trader;
use crate::types::{Order, Price, Quantity, Side, TimeInForce, TraderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct RiskConfig {
    pub max_order_qty: u32,
    pub position_limit: i64,
    pub concentration_frac: f64,
    pub loss_limit: i64,
    pub margin_threshold: i64,
    pub margin_penalty_ticks: i64,
    pub min_tick_size: Price,
    pub var_k: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_qty: 1_000_000,
            position_limit: 100_000,
            concentration_frac: 0.25,
            loss_limit: -1_000_000 * crate::types::SCALE,
            margin_threshold: -500_000 * crate::types::SCALE,
            margin_penalty_ticks: 5,
            min_tick_size: Price::from_str_decimal("0.01").unwrap(),
            var_k: 2.33,
        }
    }
}

/// Why the risk manager rejected an order, or forced a liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RiskReject {
    #[error("quantity {requested} exceeds max order size {max}")]
    SizeLimitExceeded { requested: u32, max: u32 },
    #[error("resulting position {would_be} would exceed limit {limit}")]
    PositionLimitExceeded { would_be: i64, limit: i64 },
    #[error("quantity {requested} exceeds concentration cap {cap} of opposite depth")]
    ConcentrationTooHigh { requested: u32, cap: u32 },
    #[error("loss circuit breaker tripped: pnl {pnl} below loss limit {limit}")]
    LossCircuitBreakerTripped { pnl: i64, limit: i64 },
    #[error("margin call forced liquidation for trader {trader_id}")]
    MarginCallForced { trader_id: TraderId },
}

/// A forced liquidation directive produced by `post_tick_check`, to be
/// submitted as a market-IOC at the start of the NEXT tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenDirective {
    pub trader_id: TraderId,
    pub side: Side,
    pub qty: Quantity,
    pub penalty_price: Price,
}

pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Pre-trade gating. Checks run in the fixed order the design mandates;
    /// the first failure is returned.
    pub fn check_order(
        &self,
        trader: &Trader,
        side: Side,
        qty: Quantity,
        is_aggressive: bool,
        book: &OrderBook,
        mid: Option<Price>,
    ) -> Result<(), RiskReject> {
        // 1. Max order size.
        if qty.raw() > self.config.max_order_qty {
            return Err(RiskReject::SizeLimitExceeded {
                requested: qty.raw(),
                max: self.config.max_order_qty,
            });
        }

        // 2. Position limit.
        let signed_qty = side.sign() * qty.raw() as i64;
        let would_be = trader.position + signed_qty;
        if would_be.abs() > self.config.position_limit {
            return Err(RiskReject::PositionLimitExceeded {
                would_be,
                limit: self.config.position_limit,
            });
        }

        // 3. Concentration, only for aggressive (IOC) orders.
        if is_aggressive {
            let opposite_depth = book.total_depth(side.opposite());
            let cap = (opposite_depth as f64 * self.config.concentration_frac) as u32;
            if qty.raw() > cap {
                return Err(RiskReject::ConcentrationTooHigh { requested: qty.raw(), cap });
            }
        }

        // 4. Loss circuit breaker.
        if let Some(mid) = mid {
            let pnl = trader.total_pnl(mid);
            if pnl < self.config.loss_limit {
                return Err(RiskReject::LossCircuitBreakerTripped {
                    pnl,
                    limit: self.config.loss_limit,
                });
            }
        }

        Ok(())
    }

    /// Post-tick mark-to-market check. Returns a forced liquidation
    /// directive if the trader's P&L against `mid` has breached
    /// `margin_threshold`.
    pub fn post_tick_check(&self, trader: &Trader, book: &OrderBook, mid: Price) -> Option<FlattenDirective> {
        if trader.position == 0 {
            return None;
        }
        let pnl = trader.total_pnl(mid);
        if pnl >= self.config.margin_threshold {
            return None;
        }

        // Flatten: sell if long, buy if short. Price pressure pushes the
        // order through the book (worse than best opposite by N ticks) so
        // it crosses even a thin book.
        let (flatten_side, reference) = if trader.position > 0 {
            (Side::Ask, book.best_bid())
        } else {
            (Side::Bid, book.best_ask())
        };
        let penalty = Price::new(self.config.min_tick_size.raw() * self.config.margin_penalty_ticks);
        let penalty_price = match (flatten_side, reference) {
            (Side::Ask, Some(best_bid)) => best_bid - penalty,
            (Side::Bid, Some(best_ask)) => best_ask + penalty,
            _ => mid,
        };

        Some(FlattenDirective {
            trader_id: trader.trader_id,
            side: flatten_side,
            qty: Quantity::new(trader.position.unsigned_abs() as u32),
            penalty_price,
        })
    }

    /// Value-at-risk estimate: `k * sigma_recent * |position|`.
    pub fn value_at_risk(&self, position: i64, sigma_recent: f64) -> f64 {
        self.config.var_k * sigma_recent * position.unsigned_abs() as f64
    }

    /// Build the forced-liquidation order for injection at the start of the
    /// next tick. `order_id`/`timestamp` are assigned by the caller (the
    /// simulator), which owns id allocation.
    pub fn flatten_order(
        directive: FlattenDirective,
        order_id: u64,
        timestamp: u64,
    ) -> Order {
        Order::new(
            order_id,
            directive.trader_id,
            directive.side,
            directive.penalty_price,
            directive.qty,
            timestamp,
            TimeInForce::Ioc,
            timestamp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Order, Quantity, TimeInForce};

    fn px(s: &str) -> Price {
        Price::from_str_decimal(s).unwrap()
    }

    fn risk() -> RiskManager {
        RiskManager::new(RiskConfig {
            max_order_qty: 100,
            position_limit: 50,
            concentration_frac: 0.5,
            loss_limit: px("-1000.00").raw(),
            margin_threshold: px("-500.00").raw(),
            margin_penalty_ticks: 2,
            min_tick_size: px("1.00"),
            var_k: 2.0,
        })
    }

    #[test]
    fn rejects_oversized_order() {
        let r = risk();
        let trader = Trader::new(1, 0);
        let book = OrderBook::new();
        let err = r
            .check_order(&trader, Side::Bid, Quantity::new(200), false, &book, None)
            .unwrap_err();
        assert_eq!(err, RiskReject::SizeLimitExceeded { requested: 200, max: 100 });
    }

    #[test]
    fn rejects_position_limit_breach() {
        let r = risk();
        let mut trader = Trader::new(1, 0);
        trader.position = 40;
        let book = OrderBook::new();
        let err = r
            .check_order(&trader, Side::Bid, Quantity::new(20), false, &book, None)
            .unwrap_err();
        assert_eq!(err, RiskReject::PositionLimitExceeded { would_be: 60, limit: 50 });
    }

    #[test]
    fn concentration_check_only_applies_to_aggressive_orders() {
        let r = risk();
        let trader = Trader::new(1, 0);
        let mut book = OrderBook::new();
        book.insert(Order::new(1, 2, Side::Ask, px("100.00"), Quantity::new(10), 0, TimeInForce::Gtc, 1000))
            .unwrap();

        // Non-aggressive: not checked, even though 6 > 0.5*10 = 5.
        assert!(r.check_order(&trader, Side::Bid, Quantity::new(6), false, &book, None).is_ok());

        // Aggressive: rejected.
        let err = r
            .check_order(&trader, Side::Bid, Quantity::new(6), true, &book, None)
            .unwrap_err();
        assert_eq!(err, RiskReject::ConcentrationTooHigh { requested: 6, cap: 5 });
    }

    #[test]
    fn loss_circuit_breaker_rejects_all_new_orders() {
        let r = risk();
        let mut trader = Trader::new(1, 0);
        trader.realized_pnl = px("-2000.00").raw();
        let book = OrderBook::new();
        let err = r
            .check_order(&trader, Side::Bid, Quantity::new(1), false, &book, Some(px("100.00")))
            .unwrap_err();
        assert!(matches!(err, RiskReject::LossCircuitBreakerTripped { .. }));
    }

    #[test]
    fn post_tick_check_flattens_long_position_below_threshold() {
        let r = risk();
        let mut trader = Trader::new(1, 0);
        trader.position = 10;
        trader.vwap = px("100.00");
        let mut book = OrderBook::new();
        book.insert(Order::new(1, 2, Side::Bid, px("40.00"), Quantity::new(5), 0, TimeInForce::Gtc, 1000))
            .unwrap();

        let directive = r.post_tick_check(&trader, &book, px("40.00")).unwrap();
        assert_eq!(directive.side, Side::Ask);
        assert_eq!(directive.qty, Quantity::new(10));
        assert_eq!(directive.penalty_price, px("38.00"));
    }

    #[test]
    fn post_tick_check_does_nothing_above_threshold() {
        let r = risk();
        let mut trader = Trader::new(1, 0);
        trader.position = 10;
        trader.vwap = px("100.00");
        let book = OrderBook::new();
        assert!(r.post_tick_check(&trader, &book, px("99.00")).is_none());
    }
}
