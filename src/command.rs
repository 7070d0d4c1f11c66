// nexus_exchange/src/command.rs
//
// The command interface into the simulator. Both bots and the human
// trader (scripted or interactive) speak this vocabulary; the simulator
// is the sole consumer, draining its `mpsc::Receiver<Command>` once per
// tick (see `simulator::Simulator::tick`).

use crate::risk::RiskReject;
use crate::types::{OrderId, Price, TimeInForce, TraderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Submit {
        trader: TraderId,
        side: crate::types::Side,
        price: Option<Price>,
        qty: u32,
        tif: TimeInForce,
    },
    Cancel {
        trader: TraderId,
        order_id: OrderId,
    },
    CancelAll {
        trader: TraderId,
    },
    SetParam {
        key: ConfigKey,
        value: f64,
    },
    Pause,
    Resume,
    /// Manual single-step advance, used by `replay` and by scripted scenarios
    /// that want explicit control over tick boundaries.
    Tick,
}

/// The enumerated, whitelisted set of runtime-settable config keys. Kept in
/// lockstep with `config::Config`'s fields — see `config.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigKey {
    MinTickSize,
    QuoteLifetime,
    MaxOrderQty,
    PositionLimit,
    LossLimit,
    MarginThreshold,
    MarginPenaltyTicks,
    MakerFee,
    TakerFee,
    ToxicityAlpha,
    BotLatencyMultiplier,
    VolatilityCap,
    ConcentrationFrac,
    SnapshotDepthN,
    TapeWindow,
}

/// Reasons a command can be rejected at the input layer, before it ever
/// reaches risk checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum InputError {
    #[error("unknown order id {0}")]
    UnknownOrder(OrderId),
    #[error("bad price")]
    BadPrice,
    #[error("bad quantity")]
    BadQty,
}

/// Why a command was rejected: an input-layer problem or a risk rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum RejectKind {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Risk(#[from] RiskReject),
}

/// The synchronous result of processing one command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CommandResult {
    Accepted { order_id: Option<OrderId> },
    Rejected { kind: RejectKind },
}
