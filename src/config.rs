// nexus_exchange/src/config.rs
//
// Session configuration. `Config::load` parses the TOML file into a raw
// `HashMap<String, toml::Value>` first, rejects any key outside the
// enumerated whitelist, then deserializes the validated map into the typed
// struct. This two-pass approach is what lets `UnknownConfigKey` be a
// load-time error instead of `toml` silently ignoring a typo'd key.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown config key: {0}")]
    UnknownConfigKey(String),
}

/// The enumerated, whitelisted config keys. Order here matches the
/// canonical field order in `Config`.
pub const ALLOWED_KEYS: &[&str] = &[
    "min_tick_size",
    "quote_lifetime",
    "max_order_qty",
    "position_limit",
    "loss_limit",
    "margin_threshold",
    "margin_penalty_ticks",
    "maker_fee",
    "taker_fee",
    "toxicity_alpha",
    "bot_latency_multiplier",
    "volatility_cap",
    "concentration_frac",
    "snapshot_depth_n",
    "tape_window",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_min_tick_size")]
    pub min_tick_size: String,
    #[serde(default = "default_quote_lifetime")]
    pub quote_lifetime: u64,
    #[serde(default = "default_max_order_qty")]
    pub max_order_qty: u32,
    #[serde(default = "default_position_limit")]
    pub position_limit: i64,
    #[serde(default = "default_loss_limit")]
    pub loss_limit: i64,
    #[serde(default = "default_margin_threshold")]
    pub margin_threshold: i64,
    #[serde(default = "default_margin_penalty_ticks")]
    pub margin_penalty_ticks: i64,
    #[serde(default = "default_maker_fee")]
    pub maker_fee: f64,
    #[serde(default = "default_taker_fee")]
    pub taker_fee: f64,
    #[serde(default = "default_toxicity_alpha")]
    pub toxicity_alpha: f64,
    #[serde(default = "default_bot_latency_multiplier")]
    pub bot_latency_multiplier: f64,
    #[serde(default = "default_volatility_cap")]
    pub volatility_cap: f64,
    #[serde(default = "default_concentration_frac")]
    pub concentration_frac: f64,
    #[serde(default = "default_snapshot_depth_n")]
    pub snapshot_depth_n: usize,
    #[serde(default = "default_tape_window")]
    pub tape_window: usize,
}

fn default_min_tick_size() -> String {
    "0.01".to_string()
}
fn default_quote_lifetime() -> u64 {
    20
}
fn default_max_order_qty() -> u32 {
    1_000_000
}
fn default_position_limit() -> i64 {
    100_000
}
fn default_loss_limit() -> i64 {
    -1_000_000 * crate::types::SCALE
}
fn default_margin_threshold() -> i64 {
    -500_000 * crate::types::SCALE
}
fn default_margin_penalty_ticks() -> i64 {
    5
}
fn default_maker_fee() -> f64 {
    -0.0002
}
fn default_taker_fee() -> f64 {
    0.0005
}
fn default_toxicity_alpha() -> f64 {
    0.1
}
fn default_bot_latency_multiplier() -> f64 {
    1.0
}
fn default_volatility_cap() -> f64 {
    0.5
}
fn default_concentration_frac() -> f64 {
    0.25
}
fn default_snapshot_depth_n() -> usize {
    10
}
fn default_tape_window() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_tick_size: default_min_tick_size(),
            quote_lifetime: default_quote_lifetime(),
            max_order_qty: default_max_order_qty(),
            position_limit: default_position_limit(),
            loss_limit: default_loss_limit(),
            margin_threshold: default_margin_threshold(),
            margin_penalty_ticks: default_margin_penalty_ticks(),
            maker_fee: default_maker_fee(),
            taker_fee: default_taker_fee(),
            toxicity_alpha: default_toxicity_alpha(),
            bot_latency_multiplier: default_bot_latency_multiplier(),
            volatility_cap: default_volatility_cap(),
            concentration_frac: default_concentration_frac(),
            snapshot_depth_n: default_snapshot_depth_n(),
            tape_window: default_tape_window(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, toml::Value> = toml::from_str(contents)?;
        for key in raw.keys() {
            if !ALLOWED_KEYS.contains(&key.as_str()) {
                return Err(ConfigError::UnknownConfigKey(key.clone()));
            }
        }
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Validate and apply a single runtime `SetParam` update. Returns the
    /// rejection as an error string if `key` isn't in `ALLOWED_KEYS` — the
    /// command router turns this into `InputError::BadQty`/`BadPrice` or a
    /// generic unknown-key rejection as appropriate.
    pub fn set_param(&mut self, key: &str, value: f64) -> Result<(), ConfigError> {
        if !ALLOWED_KEYS.contains(&key) {
            return Err(ConfigError::UnknownConfigKey(key.to_string()));
        }
        match key {
            "quote_lifetime" => self.quote_lifetime = value as u64,
            "max_order_qty" => self.max_order_qty = value as u32,
            "position_limit" => self.position_limit = value as i64,
            "loss_limit" => self.loss_limit = value as i64,
            "margin_threshold" => self.margin_threshold = value as i64,
            "margin_penalty_ticks" => self.margin_penalty_ticks = value as i64,
            "maker_fee" => self.maker_fee = value,
            "taker_fee" => self.taker_fee = value,
            "toxicity_alpha" => self.toxicity_alpha = value,
            "bot_latency_multiplier" => self.bot_latency_multiplier = value,
            "volatility_cap" => self.volatility_cap = value,
            "concentration_frac" => self.concentration_frac = value,
            "snapshot_depth_n" => self.snapshot_depth_n = value as usize,
            "tape_window" => self.tape_window = value as usize,
            "min_tick_size" => {} // string-typed; not settable via numeric SetParam
            _ => unreachable!("checked against ALLOWED_KEYS above"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let c = Config::default();
        assert!(c.max_order_qty > 0);
        assert!(c.taker_fee > c.maker_fee);
    }

    #[test]
    fn parse_rejects_unknown_key() {
        let toml = "max_order_qty = 500\ntypo_key = 1\n";
        let err = Config::parse(toml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownConfigKey(k) if k == "typo_key"));
    }

    #[test]
    fn parse_accepts_partial_overrides() {
        let toml = "max_order_qty = 500\n";
        let c = Config::parse(toml).unwrap();
        assert_eq!(c.max_order_qty, 500);
        assert_eq!(c.position_limit, default_position_limit());
    }

    #[test]
    fn set_param_rejects_unknown_key() {
        let mut c = Config::default();
        assert!(c.set_param("not_a_real_key", 1.0).is_err());
    }

    #[test]
    fn set_param_updates_field() {
        let mut c = Config::default();
        c.set_param("max_order_qty", 42.0).unwrap();
        assert_eq!(c.max_order_qty, 42);
    }
}
