//! Error types for the Sluice reward engine.
use thiserror::Error;

use crate::types::Address;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] Overflow,
    #[error("division by zero")] DivisionByZero,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReserveError {
    #[error("reserve holds {available} of token {token}, transfer needs {requested}")] InsufficientFunds { token: Address, available: u128, requested: u128 },
    #[error("reserve rejected transfer of {token}: {reason}")] Rejected { token: Address, reason: String },
}

/// Every rejected distributor call. A returned error means no state changed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("invalid reward token address: {0}")] InvalidRewardTokenAddress(Address),
    #[error("reward token already registered: {0}")] RewardTokenAlreadyRegistered(Address),
    #[error("unknown reward token: {0}")] UnknownRewardToken(Address),
    #[error("inflation rate {value} above max {max}")] AboveMaxInflationRate { value: u128, max: u128 },
    #[error("reduction factor {value} below min {min}")] BelowMinReductionFactor { value: u128, min: u128 },
    #[error("registry full: at most {max} reward tokens")] AboveMaxRewardTokens { max: usize },
    #[error("markets ({markets}) and weights ({weights}) differ in length")] IncorrectWeightsCount { markets: usize, weights: usize },
    #[error("weight {weight} exceeds max {max}")] WeightExceedsMax { weight: u16, max: u16 },
    #[error("weights sum to {sum}, expected {expected}")] IncorrectWeightsSum { sum: u32, expected: u16 },
    #[error("market listed twice: {0}")] DuplicateMarket(Address),
    #[error("market start time already initialized: {0}")] AlreadyInitializedStartTime(Address),
    #[error("market not initialized: {0}")] UninitializedMarket(Address),
    #[error("position of {user} in {market} already registered ({recorded})")] PositionAlreadyRegistered { user: Address, market: Address, recorded: u128 },
    #[error("position of {user} in {market} out of sync: recorded {recorded}, actual {actual}")] UserPositionMismatch { user: Address, market: Address, recorded: u128, actual: u128 },
    #[error("caller {caller} is not the authorized market for {market}")] CallerIsNotAuthorizedMarket { caller: Address, market: Address },
    #[error("early withdrawal threshold {value}s outside (0, {max}]")] InvalidEarlyWithdrawalThreshold { value: u64, max: u64 },
    #[error("max reward multiplier {value} outside [{min}, {max}]")] InvalidMaxRewardMultiplier { value: u128, min: u128, max: u128 },
    #[error("smoothing value {value} outside [{min}, {max}]")] InvalidSmoothingValue { value: u128, min: u128, max: u128 },
    #[error("{setting} is not supported by the {variant} variant")] UnsupportedForVariant { setting: &'static str, variant: &'static str },
    #[error("timestamp {now} precedes last update {last}")] TimeWentBackwards { now: u64, last: u64 },
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Reserve(#[from] ReserveError),
}
