// nexus_exchange/src/lib.rs
//
// Nexus Exchange — the root library crate.
//
// A deterministic, tick-driven simulation of a single-instrument central
// limit order book: price-time-priority matching, pre/post-trade risk
// control, a roster of scripted bot agents, and a JSONL event journal that
// makes any session exactly replayable from its seed and command log.

pub mod types;
pub mod book;
pub mod matching;
pub mod trader;
pub mod risk;
pub mod command;
pub mod error;
pub mod snapshot;
pub mod config;
pub mod journal;
pub mod bots;
pub mod simulator;

pub use book::{BookError, OrderBook, PriceLevel};
pub use bots::{BotAgent, Decision, IocOrder, LatencyGate, MarketMakerBot, NoiseTraderBot, Quote, Roster, View};
pub use command::{Command, CommandResult, ConfigKey, InputError, RejectKind};
pub use config::{Config, ConfigError};
pub use error::SimulatorError;
pub use journal::{JournalReader, JournalRecord, JournalWriter};
pub use matching::{MatchEvent, MatchingEngine};
pub use risk::{FlattenDirective, RiskConfig, RiskManager, RiskReject};
pub use simulator::{Simulator, TickOutcome};
pub use snapshot::{MarketSnapshot, TradePrint, TraderView};
pub use trader::{FillRecord, Trader};
pub use types::{Order, OrderId, Price, Quantity, Side, TimeInForce, TraderId, SCALE};
