// nexus_exchange/src/simulator/mod.rs
//
// The Simulator. Owns the book, the matching engine, every trader ledger,
// the bot roster, and the single RNG stream — for the duration of a tick,
// nothing else touches them. `tick()` is the only place time advances,
// and it runs to completion with no suspension points (§5).

pub mod schedule;

use crate::book::OrderBook;
use crate::bots::{Decision, View};
use crate::command::{Command, CommandResult, ConfigKey, InputError, RejectKind};
use crate::config::Config;
use crate::matching::{MatchEvent, MatchingEngine};
use crate::risk::{FlattenDirective, RiskConfig, RiskManager};
use crate::snapshot::{MarketSnapshot, TradePrint, TraderView};
use crate::trader::Trader;
use crate::types::{Order, OrderId, Price, Quantity, Side, TimeInForce, TraderId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::mpsc::Receiver;

/// A fill recorded this tick whose toxicity contribution is evaluated one
/// tick later, against the mid observed after the NEXT tick's matching.
struct PendingToxicity {
    taker_trader_id: TraderId,
    fill_price: Price,
    aggressor_sign: i64,
    recorded_tick: u64,
}

pub struct Simulator {
    book: OrderBook,
    engine: MatchingEngine,
    risk: RiskManager,
    traders: HashMap<TraderId, Trader>,
    roster: crate::bots::Roster,
    rng: ChaCha8Rng,
    seed: u64,
    now: u64,
    config: Config,
    command_rx: Option<Receiver<Command>>,
    pending_liquidations: Vec<FlattenDirective>,
    pending_toxicity: VecDeque<PendingToxicity>,
    fair_value: Price,
    uncertainty: f64,
    volatility: f64,
    prev_mid: Option<Price>,
    base_price: Price,
    paused: bool,
    fatal: Option<String>,
    last_trade: Option<TradePrint>,
}

/// The full record of one `tick()` call, ready to hand to the journal.
pub struct TickOutcome {
    pub events: Vec<MatchEvent>,
    pub command_results: Vec<(Command, CommandResult)>,
    pub snapshot: MarketSnapshot,
}

impl Simulator {
    pub fn new(seed: u64, config: Config, base_price: Price, command_rx: Receiver<Command>) -> Self {
        let risk_config = RiskConfig {
            max_order_qty: config.max_order_qty,
            position_limit: config.position_limit,
            concentration_frac: config.concentration_frac,
            loss_limit: config.loss_limit,
            margin_threshold: config.margin_threshold,
            margin_penalty_ticks: config.margin_penalty_ticks,
            min_tick_size: Price::from_str_decimal(&config.min_tick_size).unwrap_or(Price::new(1)),
            var_k: 2.33,
        };
        Self {
            book: OrderBook::new(),
            engine: MatchingEngine::new(),
            risk: RiskManager::new(risk_config),
            traders: HashMap::new(),
            roster: crate::bots::Roster::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            now: 0,
            config,
            command_rx: Some(command_rx),
            pending_liquidations: Vec::new(),
            pending_toxicity: VecDeque::new(),
            fair_value: base_price,
            uncertainty: 0.0,
            volatility: 0.0,
            prev_mid: None,
            base_price,
            paused: false,
            fatal: None,
            last_trade: None,
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    pub fn fund_trader(&mut self, trader_id: TraderId, starting_cash: i64) {
        self.traders.entry(trader_id).or_insert_with(|| Trader::new(trader_id, starting_cash));
    }

    pub fn register_bot(&mut self, agent: Box<dyn crate::bots::BotAgent>, base_latency: u64, jitter: u64) {
        let mult = self.config.bot_latency_multiplier;
        self.roster.register(agent, base_latency, jitter, mult);
    }

    fn min_tick(&self) -> Price {
        Price::from_str_decimal(&self.config.min_tick_size).unwrap_or(Price::new(1))
    }

    fn mid(&self) -> Option<Price> {
        self.book.mid()
    }

    fn depth_view(&self, n: usize) -> (Vec<(Price, Quantity)>, Vec<(Price, Quantity)>) {
        self.book.depth(n)
    }

    /// Run exactly one tick through the pipeline described in the design:
    /// expire, reschedule fair value, consult bots, drain commands, match,
    /// settle fills, sweep leftover IOCs, update volatility, run post-tick
    /// risk, and build a snapshot.
    pub fn tick(&mut self) -> TickOutcome {
        self.now += 1;
        let now = self.now;

        if self.is_fatal() {
            return self.build_outcome(Vec::new(), Vec::new());
        }

        self.book.expire(now);

        let (fv, unc) = schedule::schedule(self.seed, now, self.base_price, self.base_price.raw() / 50);
        self.fair_value = fv;
        self.uncertainty = unc;

        let mut ioc_ids: HashSet<OrderId> = HashSet::new();
        let mut command_results = Vec::new();

        // Forced liquidations queued by last tick's post-tick check are
        // injected first, ahead of bots and user commands, bypassing
        // pre-trade risk checks (they ARE the risk response).
        let liquidations = std::mem::take(&mut self.pending_liquidations);
        for directive in liquidations {
            let order_id = self.book.next_order_id();
            let order = RiskManager::flatten_order(directive, order_id, now);
            if self.book.insert(order).is_ok() {
                ioc_ids.insert(order_id);
            }
        }

        if !self.paused {
            self.run_roster(now, &mut ioc_ids);
            self.drain_commands(now, &mut ioc_ids, &mut command_results);
        }

        let events = self.engine.run(&mut self.book, now);

        self.settle_events(&events, now);

        for id in ioc_ids {
            let _ = self.book.cancel(id);
        }

        self.update_volatility();

        self.run_post_tick_risk();

        self.build_outcome(events, command_results)
    }

    fn run_roster(&mut self, now: u64, ioc_ids: &mut HashSet<OrderId>) {
        let (bids, asks) = self.depth_view(self.config.snapshot_depth_n);
        let trades: Vec<TradePrint> = self.last_trade.into_iter().collect();

        let fair_value = self.fair_value;
        let uncertainty = self.uncertainty;
        let volatility = self.volatility;

        // Pulled out of `self` for the duration of the loop: `apply_decision`
        // below needs `&mut self` as a whole, which would otherwise conflict
        // with the live borrow `entries_mut()` holds on `self.roster`.
        let mut roster = std::mem::take(&mut self.roster);
        for entry in roster.entries_mut() {
            if !entry.gate.is_open(now) {
                continue;
            }
            let trader_id = entry.agent.trader_id();
            let (position, pnl, toxicity) = self
                .traders
                .get(&trader_id)
                .map(|t| (t.position, t.realized_pnl, t.toxicity))
                .unwrap_or((0, 0, 0.0));

            let view = View {
                now,
                bids: &bids,
                asks: &asks,
                recent_trades: &trades,
                fair_value,
                uncertainty,
                volatility,
                own_position: position,
                own_pnl: pnl,
                own_toxicity: toxicity,
            };

            // Decide first, then advance the gate's jitter draw — a fixed
            // order per bot per tick, so replay reproduces it exactly.
            let decision = entry.agent.decide(&view, &mut self.rng);
            entry.gate.advance(now, &mut self.rng);

            let accepted_quote_ids = self.apply_decision(trader_id, decision, now, ioc_ids);
            entry.agent.note_order_ids(accepted_quote_ids);
        }
        self.roster = roster;
    }

    fn drain_commands(&mut self, now: u64, ioc_ids: &mut HashSet<OrderId>, results: &mut Vec<(Command, CommandResult)>) {
        let Some(rx) = self.command_rx.take() else { return };
        while let Ok(cmd) = rx.try_recv() {
            let result = self.apply_command(cmd, now, ioc_ids);
            results.push((cmd, result));
        }
        self.command_rx = Some(rx);
    }

    fn apply_command(&mut self, cmd: Command, now: u64, ioc_ids: &mut HashSet<OrderId>) -> CommandResult {
        match cmd {
            Command::Submit { trader, side, price, qty, tif } => {
                self.submit(trader, side, price, qty, tif, now, ioc_ids)
            }
            Command::Cancel { order_id, .. } => match self.book.cancel(order_id) {
                Ok(_) => CommandResult::Accepted { order_id: Some(order_id) },
                Err(_) => CommandResult::Rejected { kind: RejectKind::Input(InputError::UnknownOrder(order_id)) },
            },
            Command::CancelAll { trader } => {
                self.book.cancel_all(trader);
                CommandResult::Accepted { order_id: None }
            }
            Command::SetParam { key, value } => {
                let key_str = config_key_str(key);
                match self.config.set_param(key_str, value) {
                    Ok(()) => CommandResult::Accepted { order_id: None },
                    Err(_) => CommandResult::Rejected { kind: RejectKind::Input(InputError::BadQty) },
                }
            }
            Command::Pause => {
                self.paused = true;
                CommandResult::Accepted { order_id: None }
            }
            Command::Resume => {
                self.paused = false;
                CommandResult::Accepted { order_id: None }
            }
            Command::Tick => CommandResult::Accepted { order_id: None },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn submit(
        &mut self,
        trader: TraderId,
        side: Side,
        price: Option<Price>,
        qty: u32,
        tif: TimeInForce,
        now: u64,
        ioc_ids: &mut HashSet<OrderId>,
    ) -> CommandResult {
        if qty == 0 {
            return CommandResult::Rejected { kind: RejectKind::Input(InputError::BadQty) };
        }
        let Some(price) = price.or(self.mid()) else {
            return CommandResult::Rejected { kind: RejectKind::Input(InputError::BadPrice) };
        };
        if price.raw() <= 0 {
            return CommandResult::Rejected { kind: RejectKind::Input(InputError::BadPrice) };
        }
        let price = price.snap_to_tick(self.min_tick());

        self.fund_trader(trader, 0);
        let trader_ledger = self.traders.get(&trader).expect("just funded");
        let is_aggressive = matches!(tif, TimeInForce::Ioc);
        if let Err(reject) =
            self.risk.check_order(trader_ledger, side, Quantity::new(qty), is_aggressive, &self.book, self.mid())
        {
            return CommandResult::Rejected { kind: RejectKind::Risk(reject) };
        }

        let order_id = self.book.next_order_id();
        let expires_at = match tif {
            TimeInForce::Gtc => now + self.config.quote_lifetime,
            TimeInForce::Ioc => now,
        };
        let order = Order::new(order_id, trader, side, price, Quantity::new(qty), now, tif, expires_at);
        match self.book.insert(order) {
            Ok(()) => {
                if matches!(tif, TimeInForce::Ioc) {
                    ioc_ids.insert(order_id);
                }
                CommandResult::Accepted { order_id: Some(order_id) }
            }
            Err(_) => CommandResult::Rejected { kind: RejectKind::Input(InputError::BadQty) },
        }
    }

    /// Applies one participant's decision (cancels, then quotes, then IOCs —
    /// the adopted resolution for same-tick cancel/fill ordering) and
    /// returns the order ids assigned to accepted quotes, in order, so a
    /// re-quoting bot can be told what it now has resting.
    fn apply_decision(
        &mut self,
        trader_id: TraderId,
        decision: Decision,
        now: u64,
        ioc_ids: &mut HashSet<OrderId>,
    ) -> Vec<OrderId> {
        for id in decision.cancels {
            let _ = self.book.cancel(id);
        }
        let mut accepted_quote_ids = Vec::with_capacity(decision.quotes.len());
        for quote in decision.quotes {
            let result = self.submit(trader_id, quote.side, Some(quote.price), quote.qty.raw(), quote.tif, now, ioc_ids);
            if let CommandResult::Accepted { order_id: Some(id) } = result {
                accepted_quote_ids.push(id);
            }
        }
        for ioc in decision.ioc {
            let cross_price = match ioc.side {
                Side::Bid => self.book.best_ask(),
                Side::Ask => self.book.best_bid(),
            }
            .unwrap_or(self.fair_value);
            let _ = self.submit(trader_id, ioc.side, Some(cross_price), ioc.qty.raw(), TimeInForce::Ioc, now, ioc_ids);
        }
        accepted_quote_ids
    }

    fn settle_events(&mut self, events: &[MatchEvent], now: u64) {
        // Resolve toxicity contributions recorded one tick ago, before this
        // tick's fills are queued for resolution next tick.
        let mid = self.mid();
        if let Some(mid) = mid {
            while let Some(front) = self.pending_toxicity.front() {
                if front.recorded_tick >= now {
                    break;
                }
                let entry = self.pending_toxicity.pop_front().unwrap();
                let delta = mid.raw() - entry.fill_price.raw();
                let adverse = delta * entry.aggressor_sign > 0;
                if let Some(trader) = self.traders.get_mut(&entry.taker_trader_id) {
                    trader.update_toxicity(self.config.toxicity_alpha, adverse);
                }
            }
        }

        for event in events {
            self.fund_trader(event.maker_trader_id, 0);
            self.fund_trader(event.taker_trader_id, 0);

            let maker_side = if event.aggressor_side == Side::Bid { Side::Ask } else { Side::Bid };
            let taker_side = event.aggressor_side;

            if let Some(maker) = self.traders.get_mut(&event.maker_trader_id) {
                maker.apply_fill(maker_side, event.price, event.qty.raw(), now, true);
                let fee = (event.price.notional(event.qty.raw()) as f64 * self.config.maker_fee) as i64;
                maker.cash -= fee;
            }
            if let Some(taker) = self.traders.get_mut(&event.taker_trader_id) {
                taker.apply_fill(taker_side, event.price, event.qty.raw(), now, false);
                let fee = (event.price.notional(event.qty.raw()) as f64 * self.config.taker_fee) as i64;
                taker.cash -= fee;
            }

            self.pending_toxicity.push_back(PendingToxicity {
                taker_trader_id: event.taker_trader_id,
                fill_price: event.price,
                aggressor_sign: taker_side.sign(),
                recorded_tick: now,
            });

            self.last_trade = Some(TradePrint {
                price: event.price,
                qty: event.qty.raw(),
                aggressor_side: event.aggressor_side,
                tick: now,
            });
        }
    }

    fn update_volatility(&mut self) {
        let mid = self.mid();
        if let (Some(prev), Some(curr)) = (self.prev_mid, mid) {
            if prev.raw() != 0 {
                let ret = (curr.raw() - prev.raw()) as f64 / prev.raw() as f64;
                // EWMA of |return|, a standard realized-volatility proxy.
                self.volatility = (0.9 * self.volatility + 0.1 * ret.abs()).min(self.config.volatility_cap);
            }
        }
        self.prev_mid = mid;
    }

    fn run_post_tick_risk(&mut self) {
        let Some(mid) = self.mid() else { return };
        // `HashMap` iteration order is randomized per map; sort so that when
        // more than one trader breaches margin in the same tick, the
        // resulting `FlattenDirective`s are always queued (and so assigned
        // `order_id`s next tick) in the same order for the same state.
        let mut trader_ids: Vec<TraderId> = self.traders.keys().copied().collect();
        trader_ids.sort_unstable();
        for trader_id in trader_ids {
            let Some(trader) = self.traders.get(&trader_id) else { continue };
            if let Some(directive) = self.risk.post_tick_check(trader, &self.book, mid) {
                self.pending_liquidations.push(directive);
            }
        }
    }

    fn build_outcome(&self, events: Vec<MatchEvent>, command_results: Vec<(Command, CommandResult)>) -> TickOutcome {
        let (bids, asks) = self.depth_view(self.config.snapshot_depth_n);
        let bids: Vec<(Price, u32)> = bids.into_iter().map(|(p, q)| (p, q.raw())).collect();
        let asks: Vec<(Price, u32)> = asks.into_iter().map(|(p, q)| (p, q.raw())).collect();
        let mut traders: Vec<TraderView> = self
            .traders
            .values()
            .map(|t| TraderView {
                trader_id: t.trader_id,
                position: t.position,
                realized_pnl: t.realized_pnl,
                unrealized_pnl: self.mid().map(|m| t.unrealized_pnl(m)).unwrap_or(0),
                toxicity: t.toxicity,
            })
            .collect();
        // `HashMap` iteration order is randomized per map; without this the
        // snapshot's trader order (and thus the journaled bytes) would vary
        // run to run for an identical (seed, config, command stream).
        traders.sort_unstable_by_key(|t| t.trader_id);

        let snapshot = MarketSnapshot {
            tick: self.now,
            bids,
            asks,
            best_bid: self.book.best_bid(),
            best_ask: self.book.best_ask(),
            mid: self.mid(),
            last_trade: self.last_trade,
            fair_value: self.fair_value,
            uncertainty: self.uncertainty,
            volatility: self.volatility,
            traders,
            fatal: self.fatal.clone(),
        };

        TickOutcome { events, command_results, snapshot }
    }
}

fn config_key_str(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::MinTickSize => "min_tick_size",
        ConfigKey::QuoteLifetime => "quote_lifetime",
        ConfigKey::MaxOrderQty => "max_order_qty",
        ConfigKey::PositionLimit => "position_limit",
        ConfigKey::LossLimit => "loss_limit",
        ConfigKey::MarginThreshold => "margin_threshold",
        ConfigKey::MarginPenaltyTicks => "margin_penalty_ticks",
        ConfigKey::MakerFee => "maker_fee",
        ConfigKey::TakerFee => "taker_fee",
        ConfigKey::ToxicityAlpha => "toxicity_alpha",
        ConfigKey::BotLatencyMultiplier => "bot_latency_multiplier",
        ConfigKey::VolatilityCap => "volatility_cap",
        ConfigKey::ConcentrationFrac => "concentration_frac",
        ConfigKey::SnapshotDepthN => "snapshot_depth_n",
        ConfigKey::TapeWindow => "tape_window",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn px(s: &str) -> Price {
        Price::from_str_decimal(s).unwrap()
    }

    fn new_sim() -> (Simulator, std::sync::mpsc::Sender<Command>) {
        let (tx, rx) = channel();
        let mut sim = Simulator::new(1, Config::default(), px("100.00"), rx);
        sim.fund_trader(1, px("1000000.00").raw());
        sim.fund_trader(2, px("1000000.00").raw());
        sim.fund_trader(3, px("1000000.00").raw());
        (sim, tx)
    }

    #[test]
    fn fifo_same_price_scenario() {
        let (mut sim, tx) = new_sim();
        tx.send(Command::Submit { trader: 1, side: Side::Bid, price: Some(px("100.00")), qty: 10, tif: TimeInForce::Gtc }).unwrap();
        sim.tick();
        tx.send(Command::Submit { trader: 2, side: Side::Bid, price: Some(px("100.00")), qty: 10, tif: TimeInForce::Gtc }).unwrap();
        sim.tick();
        tx.send(Command::Submit { trader: 3, side: Side::Ask, price: Some(px("100.00")), qty: 5, tif: TimeInForce::Gtc }).unwrap();
        let outcome = sim.tick();

        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].maker_trader_id, 1);
        assert_eq!(outcome.events[0].taker_trader_id, 3);
        assert_eq!(outcome.events[0].qty, Quantity::new(5));
    }

    #[test]
    fn self_trade_prevention_scenario() {
        let (mut sim, tx) = new_sim();
        tx.send(Command::Submit { trader: 1, side: Side::Bid, price: Some(px("100.00")), qty: 5, tif: TimeInForce::Gtc }).unwrap();
        sim.tick();
        tx.send(Command::Submit { trader: 1, side: Side::Ask, price: Some(px("100.00")), qty: 3, tif: TimeInForce::Gtc }).unwrap();
        let outcome = sim.tick();
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn ioc_leftover_never_rests() {
        let (mut sim, tx) = new_sim();
        tx.send(Command::Submit { trader: 1, side: Side::Ask, price: Some(px("100.00")), qty: 3, tif: TimeInForce::Gtc }).unwrap();
        sim.tick();
        tx.send(Command::Submit { trader: 2, side: Side::Bid, price: Some(px("100.00")), qty: 10, tif: TimeInForce::Ioc }).unwrap();
        let outcome = sim.tick();
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].qty, Quantity::new(3));
        assert_eq!(sim.book.best_bid(), None);
        assert_eq!(sim.book.best_ask(), None);
    }

    #[test]
    fn rejected_orders_do_not_mutate_book() {
        let (mut sim, tx) = new_sim();
        tx.send(Command::Submit { trader: 1, side: Side::Bid, price: Some(px("100.00")), qty: 10_000_000, tif: TimeInForce::Gtc }).unwrap();
        let outcome = sim.tick();
        assert!(matches!(outcome.command_results[0].1, CommandResult::Rejected { .. }));
        assert_eq!(sim.book.best_bid(), None);
    }

    #[test]
    fn determinism_same_seed_same_events() {
        let base = px("100.00");
        let mut results_a = Vec::new();
        let mut results_b = Vec::new();
        for results in [&mut results_a, &mut results_b] {
            let (tx, rx) = channel();
            let mut sim = Simulator::new(99, Config::default(), base, rx);
            sim.fund_trader(1, px("1000000.00").raw());
            sim.fund_trader(2, px("1000000.00").raw());
            sim.register_bot(Box::new(crate::bots::NoiseTraderBot::new(1, 1, 5)), 1, 3);
            tx.send(Command::Submit { trader: 2, side: Side::Bid, price: Some(px("100.00")), qty: 100, tif: TimeInForce::Gtc }).unwrap();
            for _ in 0..10 {
                let outcome = sim.tick();
                results.push(outcome.events.len());
            }
        }
        assert_eq!(results_a, results_b);
    }
}
