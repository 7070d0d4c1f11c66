// nexus_exchange/src/error.rs
//
// Top-level error taxonomy. `InputError` and `RiskReject` (see `command.rs`
// and `risk/mod.rs`) are recoverable — reported to the caller, no state
// mutated. `SimulatorError` covers the two fatal kinds: a detected
// invariant violation poisons the simulator; a journal I/O failure is
// fatal to the session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("journal I/O error: {0}")]
    Journal(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}
