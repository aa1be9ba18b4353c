//! Emission schedule: per-token decaying inflation rates.
//!
//! A token emits `initial_inflation_rate` tokens per year at
//! `initial_timestamp`, and the rate is divided by `reduction_factor` for
//! every year elapsed since then:
//!
//! ```text
//! rate(now) = initial_inflation_rate / reduction_factor ^ ((now - initial_timestamp) / 1 year)
//! ```
//!
//! Changing either parameter re-anchors the curve at the time of the change,
//! so accrual already computed under the old curve is never revisited.

use sluice_core::constants::{
    MAX_INFLATION_RATE, MAX_REWARD_TOKENS, MIN_REDUCTION_FACTOR, SECONDS_PER_YEAR, WAD,
};
use sluice_core::error::{MathError, RewardError};
use sluice_core::fixed::{mul_div, wad_div, wad_pow_frac};
use sluice_core::types::Address;

/// Emission parameters of one reward token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardToken {
    /// Token identity.
    pub token: Address,
    /// Tokens per year (WAD) at `initial_timestamp`.
    pub initial_inflation_rate: u128,
    /// Annual decay divisor (WAD), at least 1.0.
    pub reduction_factor: u128,
    /// Anchor of the decay curve.
    pub initial_timestamp: u64,
    /// While paused the token accrues nothing.
    pub paused: bool,
}

/// Reject rates above [`MAX_INFLATION_RATE`].
pub fn validate_inflation_rate(rate: u128) -> Result<(), RewardError> {
    if rate > MAX_INFLATION_RATE {
        return Err(RewardError::AboveMaxInflationRate {
            value: rate,
            max: MAX_INFLATION_RATE,
        });
    }
    Ok(())
}

/// Reject factors below [`MIN_REDUCTION_FACTOR`] (which would grow the rate).
pub fn validate_reduction_factor(factor: u128) -> Result<(), RewardError> {
    if factor < MIN_REDUCTION_FACTOR {
        return Err(RewardError::BelowMinReductionFactor {
            value: factor,
            min: MIN_REDUCTION_FACTOR,
        });
    }
    Ok(())
}

impl RewardToken {
    /// Create a token anchored at `now`, validating both parameters.
    pub fn new(
        token: Address,
        initial_inflation_rate: u128,
        reduction_factor: u128,
        now: u64,
    ) -> Result<Self, RewardError> {
        if token.is_zero() {
            return Err(RewardError::InvalidRewardTokenAddress(token));
        }
        validate_inflation_rate(initial_inflation_rate)?;
        validate_reduction_factor(reduction_factor)?;
        Ok(Self {
            token,
            initial_inflation_rate,
            reduction_factor,
            initial_timestamp: now,
            paused: false,
        })
    }

    /// Inflation rate (tokens/year, WAD) in effect at `now`.
    ///
    /// Times before the anchor are treated as the anchor. Once the decay
    /// divisor no longer fits the fixed-point range the rate is zero.
    pub fn current_rate(&self, now: u64) -> Result<u128, MathError> {
        let elapsed = now.saturating_sub(self.initial_timestamp);
        if elapsed == 0 || self.reduction_factor == WAD {
            return Ok(self.initial_inflation_rate);
        }

        let years = mul_div(elapsed as u128, WAD, SECONDS_PER_YEAR as u128)?;
        let divisor = match wad_pow_frac(self.reduction_factor, years) {
            Ok(d) => d,
            Err(MathError::Overflow) => return Ok(0),
            Err(e) => return Err(e),
        };
        wad_div(self.initial_inflation_rate, divisor)
    }

    /// Replace the initial rate and re-anchor the curve at `now`.
    pub fn set_initial_inflation_rate(&mut self, rate: u128, now: u64) -> Result<(), RewardError> {
        validate_inflation_rate(rate)?;
        self.initial_inflation_rate = rate;
        self.initial_timestamp = now;
        Ok(())
    }

    /// Replace the reduction factor. The rate in effect at `now` becomes the
    /// new initial rate so the curve stays continuous.
    pub fn set_reduction_factor(&mut self, factor: u128, now: u64) -> Result<(), RewardError> {
        validate_reduction_factor(factor)?;
        let rate = self.current_rate(now)?;
        self.initial_inflation_rate = rate;
        self.initial_timestamp = now;
        self.reduction_factor = factor;
        Ok(())
    }
}

/// Bounded registry of active reward tokens, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EmissionSchedule {
    tokens: Vec<RewardToken>,
}

impl EmissionSchedule {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Check that `token` could be registered with these parameters.
    pub fn check_register(
        &self,
        token: Address,
        initial_inflation_rate: u128,
        reduction_factor: u128,
    ) -> Result<(), RewardError> {
        if token.is_zero() {
            return Err(RewardError::InvalidRewardTokenAddress(token));
        }
        if self.tokens.len() >= MAX_REWARD_TOKENS {
            return Err(RewardError::AboveMaxRewardTokens { max: MAX_REWARD_TOKENS });
        }
        if self.contains(&token) {
            return Err(RewardError::RewardTokenAlreadyRegistered(token));
        }
        validate_inflation_rate(initial_inflation_rate)?;
        validate_reduction_factor(reduction_factor)
    }

    /// Register a token anchored at `now`.
    pub fn register(
        &mut self,
        token: Address,
        initial_inflation_rate: u128,
        reduction_factor: u128,
        now: u64,
    ) -> Result<&RewardToken, RewardError> {
        self.check_register(token, initial_inflation_rate, reduction_factor)?;
        let entry = RewardToken::new(token, initial_inflation_rate, reduction_factor, now)?;
        self.tokens.push(entry);
        Ok(&self.tokens[self.tokens.len() - 1])
    }

    /// Remove a token, returning its final parameters.
    pub fn remove(&mut self, token: &Address) -> Result<RewardToken, RewardError> {
        let pos = self
            .tokens
            .iter()
            .position(|t| t.token == *token)
            .ok_or(RewardError::UnknownRewardToken(*token))?;
        Ok(self.tokens.remove(pos))
    }

    /// Look up a token.
    pub fn get(&self, token: &Address) -> Result<&RewardToken, RewardError> {
        self.tokens
            .iter()
            .find(|t| t.token == *token)
            .ok_or(RewardError::UnknownRewardToken(*token))
    }

    /// Look up a token for modification.
    pub fn get_mut(&mut self, token: &Address) -> Result<&mut RewardToken, RewardError> {
        self.tokens
            .iter_mut()
            .find(|t| t.token == *token)
            .ok_or(RewardError::UnknownRewardToken(*token))
    }

    /// Whether `token` is currently registered.
    pub fn contains(&self, token: &Address) -> bool {
        self.tokens.iter().any(|t| t.token == *token)
    }

    /// All registered tokens.
    pub fn tokens(&self) -> &[RewardToken] {
        &self.tokens
    }
}
