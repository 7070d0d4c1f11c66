// nexus_exchange/src/bots/mod.rs
//
// The bot agent contract, plus two reference strategies that exercise the
// roster end to end. Both reference bots draw every random choice from the
// session's single RNG stream — never a private `rand::thread_rng()` —
// which is what makes (seed, command log) uniquely determine every output.

use crate::snapshot::TradePrint;
use crate::types::{OrderId, Price, Quantity, Side, TimeInForce, TraderId};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// What a bot sees before deciding. A read-only projection of the
/// simulator's state — no bot can mutate the book except through the
/// `Decision` it returns.
pub struct View<'a> {
    pub now: u64,
    pub bids: &'a [(Price, Quantity)],
    pub asks: &'a [(Price, Quantity)],
    pub recent_trades: &'a [TradePrint],
    pub fair_value: Price,
    pub uncertainty: f64,
    pub volatility: f64,
    pub own_position: i64,
    pub own_pnl: i64,
    pub own_toxicity: f64,
}

impl View<'_> {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|(p, _)| *p)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|(p, _)| *p)
    }
}

/// A new GTC quote a bot wants posted.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    pub side: Side,
    pub price: Price,
    pub qty: Quantity,
    pub tif: TimeInForce,
    pub expires_at: u64,
}

/// A market-style aggressive order, priced to cross by the simulator.
#[derive(Debug, Clone, Copy)]
pub struct IocOrder {
    pub side: Side,
    pub qty: Quantity,
}

/// What a bot wants to happen this tick.
#[derive(Debug, Clone, Default)]
pub struct Decision {
    pub cancels: Vec<OrderId>,
    pub quotes: Vec<Quote>,
    pub ioc: Vec<IocOrder>,
}

/// The opaque decision function every bot implements.
pub trait BotAgent {
    fn trader_id(&self) -> TraderId;

    /// Called only when the latency gate is open (`now >= next_action_tick`).
    fn decide(&mut self, view: &View, rng: &mut ChaCha8Rng) -> Decision;

    /// Told the order ids the simulator assigned to this tick's accepted
    /// quotes, in the same order as `Decision::quotes`. Default is a no-op;
    /// strategies that re-quote (like `MarketMakerBot`) override it to
    /// remember what to cancel next time their gate opens.
    fn note_order_ids(&mut self, _order_ids: Vec<OrderId>) {}
}

/// `(base_latency, jitter)` gate: a bot is consulted only once
/// `now >= next_action_tick`; after consultation the next tick is drawn as
/// `now + base_latency + uniform(0, jitter)` from the session RNG so the
/// schedule itself is reproducible.
pub struct LatencyGate {
    base_latency: u64,
    jitter: u64,
    next_action_tick: u64,
}

impl LatencyGate {
    pub fn new(base_latency: u64, jitter: u64, latency_multiplier: f64) -> Self {
        let scaled = ((base_latency as f64) * latency_multiplier).round() as u64;
        Self { base_latency: scaled, jitter, next_action_tick: 0 }
    }

    pub fn is_open(&self, now: u64) -> bool {
        now >= self.next_action_tick
    }

    pub fn advance(&mut self, now: u64, rng: &mut ChaCha8Rng) {
        let jitter_draw = if self.jitter == 0 { 0 } else { rng.gen_range(0..=self.jitter) };
        self.next_action_tick = now + self.base_latency + jitter_draw;
    }
}

/// One roster entry: the gate plus the boxed strategy.
pub struct RosterEntry {
    pub gate: LatencyGate,
    pub agent: Box<dyn BotAgent>,
}

/// The fixed-order roster. Bots are consulted in registration order every
/// tick, matching the deterministic pipeline in `simulator::Simulator::tick`.
#[derive(Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Box<dyn BotAgent>, base_latency: u64, jitter: u64, latency_multiplier: f64) {
        self.entries.push(RosterEntry { gate: LatencyGate::new(base_latency, jitter, latency_multiplier), agent });
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut RosterEntry> {
        self.entries.iter_mut()
    }
}

/// Quotes a two-sided GTC ladder symmetric around `fair_value ± half_spread`,
/// re-quoting (cancel then re-post) every time its gate opens.
pub struct MarketMakerBot {
    trader_id: TraderId,
    half_spread: Price,
    quote_qty: u32,
    quote_lifetime: u64,
    resting_ids: Vec<OrderId>,
}

impl MarketMakerBot {
    pub fn new(trader_id: TraderId, half_spread: Price, quote_qty: u32, quote_lifetime: u64) -> Self {
        Self { trader_id, half_spread, quote_qty, quote_lifetime, resting_ids: Vec::new() }
    }

    /// Record the ids the simulator assigned to this bot's last quotes, so
    /// the next `decide` can cancel them before re-quoting.
    pub fn note_resting_ids(&mut self, ids: Vec<OrderId>) {
        self.resting_ids = ids;
    }
}

impl BotAgent for MarketMakerBot {
    fn trader_id(&self) -> TraderId {
        self.trader_id
    }

    fn decide(&mut self, view: &View, _rng: &mut ChaCha8Rng) -> Decision {
        let bid_price = view.fair_value - self.half_spread;
        let ask_price = view.fair_value + self.half_spread;
        let expires_at = view.now + self.quote_lifetime;

        Decision {
            cancels: std::mem::take(&mut self.resting_ids),
            quotes: vec![
                Quote { side: Side::Bid, price: bid_price, qty: Quantity::new(self.quote_qty), tif: TimeInForce::Gtc, expires_at },
                Quote { side: Side::Ask, price: ask_price, qty: Quantity::new(self.quote_qty), tif: TimeInForce::Gtc, expires_at },
            ],
            ioc: Vec::new(),
        }
    }

    fn note_order_ids(&mut self, order_ids: Vec<OrderId>) {
        self.note_resting_ids(order_ids);
    }
}

/// On each gate opening, draws a side and a small IOC size from the
/// session RNG and crosses the spread.
pub struct NoiseTraderBot {
    trader_id: TraderId,
    min_qty: u32,
    max_qty: u32,
}

impl NoiseTraderBot {
    pub fn new(trader_id: TraderId, min_qty: u32, max_qty: u32) -> Self {
        Self { trader_id, min_qty, max_qty }
    }
}

impl BotAgent for NoiseTraderBot {
    fn trader_id(&self) -> TraderId {
        self.trader_id
    }

    fn decide(&mut self, _view: &View, rng: &mut ChaCha8Rng) -> Decision {
        let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
        let qty = rng.gen_range(self.min_qty..=self.max_qty);
        Decision {
            cancels: Vec::new(),
            quotes: Vec::new(),
            ioc: vec![IocOrder { side, qty: Quantity::new(qty) }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn view<'a>(
        fair_value: Price,
        bids: &'a [(Price, Quantity)],
        asks: &'a [(Price, Quantity)],
        trades: &'a [TradePrint],
    ) -> View<'a> {
        View {
            now: 10,
            bids,
            asks,
            recent_trades: trades,
            fair_value,
            uncertainty: 0.0,
            volatility: 0.0,
            own_position: 0,
            own_pnl: 0,
            own_toxicity: 0.0,
        }
    }

    #[test]
    fn market_maker_quotes_symmetric_ladder() {
        let mut bot = MarketMakerBot::new(1, Price::from_str_decimal("0.50").unwrap(), 10, 20);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let v = view(Price::from_str_decimal("100.00").unwrap(), &[], &[], &[]);
        let decision = bot.decide(&v, &mut rng);
        assert_eq!(decision.quotes.len(), 2);
        assert_eq!(decision.quotes[0].price, Price::from_str_decimal("99.50").unwrap());
        assert_eq!(decision.quotes[1].price, Price::from_str_decimal("100.50").unwrap());
    }

    #[test]
    fn market_maker_cancels_prior_quotes_before_requoting() {
        let mut bot = MarketMakerBot::new(1, Price::from_str_decimal("0.50").unwrap(), 10, 20);
        bot.note_resting_ids(vec![5, 6]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let v = view(Price::from_str_decimal("100.00").unwrap(), &[], &[], &[]);
        let decision = bot.decide(&v, &mut rng);
        assert_eq!(decision.cancels, vec![5, 6]);
    }

    #[test]
    fn noise_trader_draws_from_given_rng_deterministically() {
        let mut bot_a = NoiseTraderBot::new(2, 1, 5);
        let mut bot_b = NoiseTraderBot::new(2, 1, 5);
        let mut rng_a = ChaCha8Rng::seed_from_u64(42);
        let mut rng_b = ChaCha8Rng::seed_from_u64(42);
        let v = view(Price::from_str_decimal("100.00").unwrap(), &[], &[], &[]);

        let da = bot_a.decide(&v, &mut rng_a);
        let db = bot_b.decide(&v, &mut rng_b);
        assert_eq!(da.ioc[0].side, db.ioc[0].side);
        assert_eq!(da.ioc[0].qty, db.ioc[0].qty);
    }

    #[test]
    fn latency_gate_opens_only_after_next_action_tick() {
        let mut gate = LatencyGate::new(5, 2, 1.0);
        assert!(gate.is_open(0));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        gate.advance(0, &mut rng);
        assert!(!gate.is_open(0));
        assert!(gate.is_open(gate.next_action_tick));
    }

    #[test]
    fn latency_multiplier_scales_base_latency() {
        let gate = LatencyGate::new(10, 0, 2.0);
        assert_eq!(gate.base_latency, 20);
    }
}
