//! Protocol constants. All rates, factors and multipliers are WAD fixed-point
//! (1.0 = 10^18); times are Unix seconds.

/// Fixed-point scale: 1.0 in WAD units.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Seconds in one day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Seconds in one (non-leap) year. Emission rates are expressed per year.
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// Basis points making up a whole market-weight allocation (100%).
pub const MAX_BASIS_POINTS: u16 = 10_000;

/// Maximum number of reward tokens a distributor may carry at once.
pub const MAX_REWARD_TOKENS: usize = 10;

/// Upper bound on a token's initial inflation rate (5,000,000 tokens/year in WAD).
pub const MAX_INFLATION_RATE: u128 = 5_000_000 * WAD;

/// Lower bound on a token's annual reduction factor. 1.0 means no decay.
pub const MIN_REDUCTION_FACTOR: u128 = WAD;

// ---------------------------------------------------------------------------
// Liquidity-provider ramp
// ---------------------------------------------------------------------------

/// Default early-withdrawal ramp length: 10 days.
pub const DEFAULT_EARLY_WITHDRAWAL_THRESHOLD: u64 = 10 * SECONDS_PER_DAY;

/// Longest ramp governance may configure: 30 days.
pub const MAX_EARLY_WITHDRAWAL_THRESHOLD: u64 = 30 * SECONDS_PER_DAY;

// ---------------------------------------------------------------------------
// Staker multiplier
// ---------------------------------------------------------------------------

/// Default ceiling of the staking multiplier: 4x.
pub const DEFAULT_MAX_REWARD_MULTIPLIER: u128 = 4 * WAD;

/// Smallest allowed multiplier ceiling (1x disables the boost).
pub const MIN_MAX_REWARD_MULTIPLIER: u128 = WAD;

/// Largest allowed multiplier ceiling: 10x.
pub const MAX_MAX_REWARD_MULTIPLIER: u128 = 10 * WAD;

/// Default smoothing value of the multiplier curve (30 days to reach ~halfway).
pub const DEFAULT_SMOOTHING_VALUE: u128 = 30 * WAD;

/// Smallest allowed smoothing value.
pub const MIN_SMOOTHING_VALUE: u128 = 10 * WAD;

/// Largest allowed smoothing value.
pub const MAX_SMOOTHING_VALUE: u128 = 100 * WAD;
