// nexus_exchange/src/bin/nexus.rs
//
// The `nexus` CLI: `run` drives a headless session from a config and an
// optional pre-authored scenario file, journaling every command and event;
// `replay` reconstructs a session from its journal and prints a summary.
//
// Exit codes: 0 clean shutdown, 2 bad config, 3 journal I/O error.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nexus_exchange::{
    Command, Config, ConfigKey, JournalReader, JournalRecord, JournalWriter, MarketMakerBot,
    NoiseTraderBot, Price, Side, Simulator, TimeInForce,
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nexus")]
#[command(about = "Deterministic CLOB matching engine and tick simulator")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run a headless session, journaling every command and event.
    Run {
        #[arg(long)]
        seed: u64,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        journal: PathBuf,
        /// Fixed tick count. Omit to run until the scenario file is exhausted.
        #[arg(long)]
        ticks: Option<u64>,
        /// Newline-delimited pre-authored Commands, the "human trader" input.
        #[arg(long)]
        scenario: Option<PathBuf>,
    },
    /// Reconstruct a session from its journal and print a summary.
    Replay {
        #[arg(long)]
        journal: PathBuf,
        /// Stop reconstruction early at this tick.
        #[arg(long)]
        until: Option<u64>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Cmd::Run { seed, config, journal, ticks, scenario } => run_session(seed, config, journal, ticks, scenario),
        Cmd::Replay { journal, until } => replay_session(journal, until),
    }
}

fn run_session(
    seed: u64,
    config_path: Option<PathBuf>,
    journal_path: PathBuf,
    ticks: Option<u64>,
    scenario_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = match config_path {
        Some(path) => match Config::load(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("bad config at {}: {e}", path.display());
                return Ok(ExitCode::from(2));
            }
        },
        None => Config::default(),
    };

    let mut journal = match JournalWriter::create(&journal_path) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!("failed to open journal at {}: {e}", journal_path.display());
            return Ok(ExitCode::from(3));
        }
    };

    let started_at = 0;
    if let Err(e) = journal.append(&JournalRecord::Header { seed, config: config.clone(), started_at }) {
        tracing::error!("journal I/O error writing header: {e}");
        return Ok(ExitCode::from(3));
    }

    let (tx, rx) = mpsc::channel();
    let mut sim = build_simulator(seed, &config, rx);

    let scenario_commands = match scenario_path {
        Some(path) => Some(load_scenario(&path)?),
        None => None,
    };

    info!(seed, ?ticks, "starting session");

    let mut tick_index: u64 = 0;
    loop {
        if let Some(n) = ticks {
            if tick_index >= n {
                break;
            }
        }
        if let Some(commands) = &scenario_commands {
            if tick_index as usize >= commands.len() && ticks.is_none() {
                break;
            }
            if let Some(cmd) = commands.get(tick_index as usize) {
                let _ = tx.send(*cmd);
            }
        }

        let outcome = sim.tick();
        tick_index += 1;

        let write_result = (|| -> std::io::Result<()> {
            for event in &outcome.events {
                journal.append(&JournalRecord::Event { tick: sim.now(), event: *event })?;
            }
            for (command, result) in &outcome.command_results {
                journal.append(&JournalRecord::Command { tick: sim.now(), command: *command, result: *result })?;
            }
            journal.append(&JournalRecord::Snapshot { tick: sim.now(), snapshot: Box::new(outcome.snapshot.clone()) })
        })();
        if let Err(e) = write_result {
            tracing::error!("journal I/O error at tick {}: {e}", sim.now());
            return Ok(ExitCode::from(3));
        }

        if sim.is_fatal() {
            warn!("simulator halted on a fatal invariant violation");
            break;
        }
    }

    info!(final_tick = sim.now(), "session complete");
    Ok(ExitCode::from(0))
}

/// Builds the fixed bot roster and starting funding shared by a fresh `run`
/// and by `replay`'s reconstruction — the only way two sessions built from
/// the same `(seed, config)` end up identical is if both paths build the
/// simulator the exact same way.
fn build_simulator(seed: u64, config: &Config, command_rx: mpsc::Receiver<Command>) -> Simulator {
    let base_price = Price::from_str_decimal("100.00").unwrap();
    let mut sim = Simulator::new(seed, config.clone(), base_price, command_rx);

    sim.fund_trader(1, Price::from_str_decimal("1000000.00").unwrap().raw());
    sim.register_bot(
        Box::new(MarketMakerBot::new(2, Price::from_str_decimal("0.25").unwrap(), 20, config.quote_lifetime)),
        1,
        1,
    );
    sim.register_bot(Box::new(NoiseTraderBot::new(3, 1, 10)), 2, 4);
    sim.fund_trader(2, Price::from_str_decimal("1000000.00").unwrap().raw());
    sim.fund_trader(3, Price::from_str_decimal("1000000.00").unwrap().raw());
    sim
}

fn load_scenario(path: &PathBuf) -> Result<Vec<Command>> {
    let file = File::open(path).with_context(|| format!("opening scenario file {}", path.display()))?;
    let mut commands = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        commands.push(parse_scenario_line(line)?);
    }
    Ok(commands)
}

/// Parses one scripted line of the form `SUBMIT trader side price qty tif`,
/// `CANCEL trader order_id`, or `CANCEL_ALL trader`. A minimal textual
/// stand-in for the richer structured formats a real UI would emit.
fn parse_scenario_line(line: &str) -> Result<Command> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["SUBMIT", trader, side, price, qty, tif] => Ok(Command::Submit {
            trader: trader.parse().context("trader id")?,
            side: parse_side(side)?,
            price: Some(Price::from_str_decimal(price).map_err(|e| anyhow::anyhow!(e))?),
            qty: qty.parse().context("qty")?,
            tif: parse_tif(tif)?,
        }),
        ["CANCEL", trader, order_id] => {
            Ok(Command::Cancel { trader: trader.parse().context("trader id")?, order_id: order_id.parse().context("order id")? })
        }
        ["CANCEL_ALL", trader] => Ok(Command::CancelAll { trader: trader.parse().context("trader id")? }),
        ["SET_PARAM", key, value] => {
            Ok(Command::SetParam { key: parse_config_key(key)?, value: value.parse().context("value")? })
        }
        ["PAUSE"] => Ok(Command::Pause),
        ["RESUME"] => Ok(Command::Resume),
        _ => anyhow::bail!("unrecognized scenario line: {line}"),
    }
}

fn parse_side(s: &str) -> Result<Side> {
    Side::from_str(s).map_err(|e| anyhow::anyhow!(e))
}

fn parse_tif(s: &str) -> Result<TimeInForce> {
    match s.to_ascii_uppercase().as_str() {
        "GTC" => Ok(TimeInForce::Gtc),
        "IOC" => Ok(TimeInForce::Ioc),
        other => anyhow::bail!("unknown time-in-force: {other}"),
    }
}

fn parse_config_key(s: &str) -> Result<ConfigKey> {
    Ok(match s {
        "min_tick_size" => ConfigKey::MinTickSize,
        "quote_lifetime" => ConfigKey::QuoteLifetime,
        "max_order_qty" => ConfigKey::MaxOrderQty,
        "position_limit" => ConfigKey::PositionLimit,
        "loss_limit" => ConfigKey::LossLimit,
        "margin_threshold" => ConfigKey::MarginThreshold,
        "margin_penalty_ticks" => ConfigKey::MarginPenaltyTicks,
        "maker_fee" => ConfigKey::MakerFee,
        "taker_fee" => ConfigKey::TakerFee,
        "toxicity_alpha" => ConfigKey::ToxicityAlpha,
        "bot_latency_multiplier" => ConfigKey::BotLatencyMultiplier,
        "volatility_cap" => ConfigKey::VolatilityCap,
        "concentration_frac" => ConfigKey::ConcentrationFrac,
        "snapshot_depth_n" => ConfigKey::SnapshotDepthN,
        "tape_window" => ConfigKey::TapeWindow,
        other => anyhow::bail!("unknown config key: {other}"),
    })
}

/// Reconstructs a session from its journal: rebuilds a fresh, identically
/// seeded and rostered `Simulator` from the `Header` record, then replays
/// each `Command` record at the tick it was originally recorded at. The
/// journal's `Event`/`Snapshot` records are only used here to bound how far
/// to replay; the reconstructed state itself comes entirely from driving
/// the simulator, not from anything already computed in the file.
fn replay_session(journal_path: PathBuf, until: Option<u64>) -> Result<ExitCode> {
    let reader = match JournalReader::open(&journal_path) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("failed to open journal at {}: {e}", journal_path.display());
            return Ok(ExitCode::from(3));
        }
    };

    let mut seed = None;
    let mut config = None;
    let mut commands_by_tick: std::collections::BTreeMap<u64, Vec<Command>> = std::collections::BTreeMap::new();
    let mut max_tick = 0u64;

    for record in reader {
        let record = record.map_err(|e| anyhow::anyhow!("journal read error: {e}"))?;
        match record {
            JournalRecord::Header { seed: s, config: c, started_at } => {
                seed = Some(s);
                config = Some(c);
                info!(seed = s, started_at, "replaying session header");
            }
            JournalRecord::Command { tick, command, .. } => {
                if until.is_some_and(|u| tick > u) {
                    break;
                }
                commands_by_tick.entry(tick).or_default().push(command);
                max_tick = max_tick.max(tick);
            }
            JournalRecord::Event { tick, .. } | JournalRecord::Snapshot { tick, .. } => {
                if until.is_some_and(|u| tick > u) {
                    break;
                }
                max_tick = max_tick.max(tick);
            }
        }
    }

    let seed = seed.ok_or_else(|| anyhow::anyhow!("journal has no header record"))?;
    let config = config.ok_or_else(|| anyhow::anyhow!("journal has no header record"))?;

    let (tx, rx) = mpsc::channel();
    let mut sim = build_simulator(seed, &config, rx);

    let mut last_snapshot = None;
    for tick in 1..=max_tick {
        if let Some(commands) = commands_by_tick.get(&tick) {
            for command in commands {
                let _ = tx.send(*command);
            }
        }
        let outcome = sim.tick();
        last_snapshot = Some(outcome.snapshot);
        if sim.is_fatal() {
            warn!("simulator halted on a fatal invariant violation during replay");
            break;
        }
    }

    println!("=== Replay Summary ===");
    println!("seed: {seed}");
    println!("ticks reconstructed: {}", sim.now());
    match &last_snapshot {
        Some(snapshot) => {
            println!("final best bid: {:?}", snapshot.best_bid);
            println!("final best ask: {:?}", snapshot.best_ask);
            println!("final mid: {:?}", snapshot.mid);
            for trader in &snapshot.traders {
                println!(
                    "trader {}: position {} realized_pnl {}",
                    trader.trader_id, trader.position, trader.realized_pnl
                );
            }
        }
        None => println!("no ticks were replayed"),
    }

    Ok(ExitCode::from(0))
}
