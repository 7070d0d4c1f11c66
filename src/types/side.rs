// nexus_exchange/src/types/side.rs
//
// The ONE TRUE Side Enum.
//
// Matches the book's own vocabulary: a resting order sits on the Bid side
// or the Ask side. Keep this the single source of truth — nothing else in
// the crate should invent its own buy/sell flag.

use std::fmt;

/// Order side: Bid (buy) or Ask (sell). Represented as a single byte (`u8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Side {
    Bid = 1,
    Ask = 2,
}

impl Side {
    /// Parse from a string (case-insensitive).
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "bid" | "buy" => Ok(Side::Bid),
            "ask" | "sell" => Ok(Side::Ask),
            _ => Err("side must be 'bid' or 'ask'".to_string()),
        }
    }

    /// The opposite side.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Sign multiplier: Bid = +1, Ask = -1.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Bid => 1,
            Side::Ask => -1,
        }
    }

    /// Raw u8 value for compact journal encodings.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Reconstruct from raw u8.
    pub fn from_u8(value: u8) -> Result<Self, String> {
        match value {
            1 => Ok(Side::Bid),
            2 => Ok(Side::Ask),
            _ => Err(format!("invalid Side byte: {value}, must be 1 (Bid) or 2 (Ask)")),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "Bid"),
            Side::Ask => write!(f, "Ask"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_size_is_one_byte() {
        assert_eq!(std::mem::size_of::<Side>(), 1);
    }

    #[test]
    fn side_from_str_case_insensitive() {
        assert_eq!(Side::from_str("bid").unwrap(), Side::Bid);
        assert_eq!(Side::from_str("BID").unwrap(), Side::Bid);
        assert_eq!(Side::from_str("buy").unwrap(), Side::Bid);
        assert_eq!(Side::from_str("ask").unwrap(), Side::Ask);
        assert_eq!(Side::from_str("SELL").unwrap(), Side::Ask);
    }

    #[test]
    fn side_roundtrip_u8() {
        assert_eq!(Side::from_u8(Side::Bid.as_u8()).unwrap(), Side::Bid);
        assert_eq!(Side::from_u8(Side::Ask.as_u8()).unwrap(), Side::Ask);
        assert!(Side::from_u8(0).is_err());
        assert!(Side::from_u8(3).is_err());
    }

    #[test]
    fn side_opposite_and_sign() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
        assert_eq!(Side::Bid.sign(), 1);
        assert_eq!(Side::Ask.sign(), -1);
    }
}
