//! Identifiers and the event journal shared across Sluice crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A 20-byte account identifier. Names reward tokens, markets and users alike.
///
/// Serialized as a `0x`-prefixed lowercase hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid reward token.
    pub const ZERO: Self = Self([0u8; 20]);

    /// An address made of one repeated byte. Handy for fixtures.
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; 20])
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

/// Failure to parse an [`Address`] from text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let array: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Observable state changes, appended to the distributor's journal in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RewardEvent {
    RewardTokenAdded { token: Address, initial_inflation_rate: u128, reduction_factor: u128, timestamp: u64 },
    RewardTokenRemoved { token: Address, total_owed: u128, returned: u128 },
    MarketStartTimeInitialized { market: Address, authority: Address, timestamp: u64 },
    NewWeight { token: Address, market: Address, weight: u16 },
    MarketRemovedFromRewards { token: Address, market: Address },
    RewardAccruedToMarket { token: Address, market: Address, amount: u128 },
    RewardAccruedToUser { user: Address, token: Address, market: Address, amount: u128 },
    PositionUpdated { market: Address, user: Address, previous: u128, current: u128 },
    PositionRegistered { market: Address, user: Address, position: u128 },
    RewardClaimed { user: Address, token: Address, amount: u128, keeper: Address },
    RewardTokenShortfall { token: Address, user: Address, shortfall: u128 },
    RewardTransferRejected { token: Address, user: Address, amount: u128, reason: String },
    InitialInflationRateUpdated { token: Address, rate: u128 },
    ReductionFactorUpdated { token: Address, factor: u128 },
    RewardTokenPaused { token: Address, paused: bool },
    EarlyWithdrawalThresholdUpdated { threshold: u64 },
    MaxRewardMultiplierUpdated { multiplier: u128 },
    SmoothingValueUpdated { value: u128 },
}
