//! Position-scaling variants applied to freshly accrued rewards.
//!
//! A distributor runs exactly one variant, chosen at construction:
//!
//! - [`EarlyWithdrawalRamp`] for liquidity providers. Rewards earned soon
//!   after a deposit into an empty position are discounted linearly, reaching
//!   full value `threshold` seconds after the deposit.
//! - [`StakeMultiplier`] for stakers. Rewards are boosted by a multiplier that
//!   grows from 1x towards `max_multiplier` with holding time:
//!
//! ```text
//! m(days) = M - S * (M - 1) / (days * (M - 1) + S)
//! ```
//!
//! Both track a per-(user, market) start time, updated by
//! [`PositionScaling::on_position_change`] after the accrual that precedes a
//! position change.

use std::collections::HashMap;

use sluice_core::U256;
use sluice_core::constants::{
    MAX_EARLY_WITHDRAWAL_THRESHOLD, MAX_MAX_REWARD_MULTIPLIER, MAX_SMOOTHING_VALUE,
    MIN_MAX_REWARD_MULTIPLIER, MIN_SMOOTHING_VALUE, SECONDS_PER_DAY, WAD,
};
use sluice_core::error::{MathError, RewardError};
use sluice_core::fixed::{mul_div, wad_mul};
use sluice_core::types::Address;

pub fn validate_early_withdrawal_threshold(threshold: u64) -> Result<(), RewardError> {
    if threshold == 0 || threshold > MAX_EARLY_WITHDRAWAL_THRESHOLD {
        return Err(RewardError::InvalidEarlyWithdrawalThreshold {
            value: threshold,
            max: MAX_EARLY_WITHDRAWAL_THRESHOLD,
        });
    }
    Ok(())
}

pub fn validate_max_reward_multiplier(multiplier: u128) -> Result<(), RewardError> {
    if !(MIN_MAX_REWARD_MULTIPLIER..=MAX_MAX_REWARD_MULTIPLIER).contains(&multiplier) {
        return Err(RewardError::InvalidMaxRewardMultiplier {
            value: multiplier,
            min: MIN_MAX_REWARD_MULTIPLIER,
            max: MAX_MAX_REWARD_MULTIPLIER,
        });
    }
    Ok(())
}

pub fn validate_smoothing_value(value: u128) -> Result<(), RewardError> {
    if !(MIN_SMOOTHING_VALUE..=MAX_SMOOTHING_VALUE).contains(&value) {
        return Err(RewardError::InvalidSmoothingValue {
            value,
            min: MIN_SMOOTHING_VALUE,
            max: MAX_SMOOTHING_VALUE,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Liquidity-provider ramp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EarlyWithdrawalRamp {
    threshold: u64,
    timer_start: HashMap<(Address, Address), u64>,
}

impl EarlyWithdrawalRamp {
    pub fn new(threshold: u64) -> Result<Self, RewardError> {
        validate_early_withdrawal_threshold(threshold)?;
        Ok(Self {
            threshold,
            timer_start: HashMap::new(),
        })
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Time of the deposit that armed the ramp, `None` for an empty position.
    pub fn timer_start(&self, user: &Address, market: &Address) -> Option<u64> {
        self.timer_start.get(&(*user, *market)).copied()
    }

    /// `raw * min(now - start, threshold) / threshold`.
    pub fn scale(&self, raw: u128, user: &Address, market: &Address, now: u64) -> Result<u128, MathError> {
        let Some(start) = self.timer_start(user, market) else {
            return Ok(raw);
        };
        let elapsed = now.saturating_sub(start).min(self.threshold);
        if elapsed == self.threshold {
            return Ok(raw);
        }
        mul_div(raw, elapsed as u128, self.threshold as u128)
    }

    fn on_position_change(&mut self, user: Address, market: Address, previous: u128, current: u128, now: u64) {
        if current == 0 {
            self.timer_start.remove(&(user, market));
        } else if previous == 0 {
            self.timer_start.insert((user, market), now);
        }
    }
}

// ---------------------------------------------------------------------------
// Staker multiplier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StakeMultiplier {
    max_multiplier: u128,
    smoothing_value: u128,
    start_time: HashMap<(Address, Address), u64>,
}

impl StakeMultiplier {
    pub fn new(max_multiplier: u128, smoothing_value: u128) -> Result<Self, RewardError> {
        validate_max_reward_multiplier(max_multiplier)?;
        validate_smoothing_value(smoothing_value)?;
        Ok(Self {
            max_multiplier,
            smoothing_value,
            start_time: HashMap::new(),
        })
    }

    pub fn max_multiplier(&self) -> u128 {
        self.max_multiplier
    }

    pub fn smoothing_value(&self) -> u128 {
        self.smoothing_value
    }

    /// Size-weighted start time of `user`'s stake, `None` when unstaked.
    pub fn start_time(&self, user: &Address, market: &Address) -> Option<u64> {
        self.start_time.get(&(*user, *market)).copied()
    }

    /// Current multiplier (WAD) for `user` in `market`. Unstaked users get 1x.
    pub fn multiplier(&self, user: &Address, market: &Address, now: u64) -> Result<u128, MathError> {
        let Some(start) = self.start_time(user, market) else {
            return Ok(WAD);
        };
        let boost = self.max_multiplier - WAD;
        if boost == 0 {
            return Ok(WAD);
        }

        let days = mul_div(now.saturating_sub(start) as u128, WAD, SECONDS_PER_DAY as u128)?;
        let denominator = wad_mul(days, boost)?
            .checked_add(self.smoothing_value)
            .ok_or(MathError::Overflow)?;
        let discount = mul_div(self.smoothing_value, boost, denominator)?;
        Ok(self.max_multiplier - discount)
    }

    pub fn scale(&self, raw: u128, user: &Address, market: &Address, now: u64) -> Result<u128, MathError> {
        wad_mul(raw, self.multiplier(user, market, now)?)
    }

    fn on_position_change(&mut self, user: Address, market: Address, previous: u128, current: u128, now: u64) {
        let key = (user, market);
        if current == 0 {
            self.start_time.remove(&key);
            return;
        }
        if current <= previous {
            return;
        }
        match self.start_time.get(&key).copied() {
            Some(old) if previous > 0 => {
                // Blend the existing cohort with the incoming amount.
                let incoming = current - previous;
                let weighted = U256::from(old) * U256::from(previous)
                    + U256::from(now) * U256::from(incoming);
                let blended = weighted / U256::from(current);
                self.start_time.insert(key, blended.low_u64());
            }
            _ => {
                self.start_time.insert(key, now);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Variant selection
// ---------------------------------------------------------------------------

/// The scaling rule a distributor applies to newly accrued rewards.
#[derive(Debug, Clone)]
pub enum PositionScaling {
    EarlyWithdrawal(EarlyWithdrawalRamp),
    StakeMultiplier(StakeMultiplier),
}

impl PositionScaling {
    pub fn early_withdrawal(threshold: u64) -> Result<Self, RewardError> {
        Ok(Self::EarlyWithdrawal(EarlyWithdrawalRamp::new(threshold)?))
    }

    pub fn stake_multiplier(max_multiplier: u128, smoothing_value: u128) -> Result<Self, RewardError> {
        Ok(Self::StakeMultiplier(StakeMultiplier::new(max_multiplier, smoothing_value)?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EarlyWithdrawal(_) => "early_withdrawal",
            Self::StakeMultiplier(_) => "stake_multiplier",
        }
    }

    /// Scale a raw accrual for `user` in `market` at `now`.
    pub fn scale(&self, raw: u128, user: &Address, market: &Address, now: u64) -> Result<u128, MathError> {
        if raw == 0 {
            return Ok(0);
        }
        match self {
            Self::EarlyWithdrawal(ramp) => ramp.scale(raw, user, market, now),
            Self::StakeMultiplier(stake) => stake.scale(raw, user, market, now),
        }
    }

    /// Record that `user`'s position in `market` moved from `previous` to
    /// `current` at `now`.
    pub fn on_position_change(&mut self, user: Address, market: Address, previous: u128, current: u128, now: u64) {
        match self {
            Self::EarlyWithdrawal(ramp) => ramp.on_position_change(user, market, previous, current, now),
            Self::StakeMultiplier(stake) => stake.on_position_change(user, market, previous, current, now),
        }
    }

    /// Ramp start for `user` in `market`; 0 when unarmed or for stakers.
    pub fn withdraw_timer_start(&self, user: &Address, market: &Address) -> u64 {
        match self {
            Self::EarlyWithdrawal(ramp) => ramp.timer_start(user, market).unwrap_or(0),
            Self::StakeMultiplier(_) => 0,
        }
    }

    /// Multiplier start for `user` in `market`; 0 when unstaked or for
    /// liquidity providers.
    pub fn multiplier_start_time(&self, user: &Address, market: &Address) -> u64 {
        match self {
            Self::EarlyWithdrawal(_) => 0,
            Self::StakeMultiplier(stake) => stake.start_time(user, market).unwrap_or(0),
        }
    }

    pub fn reward_multiplier(&self, user: &Address, market: &Address, now: u64) -> Result<u128, RewardError> {
        match self {
            Self::StakeMultiplier(stake) => Ok(stake.multiplier(user, market, now)?),
            Self::EarlyWithdrawal(_) => Err(self.unsupported("reward_multiplier")),
        }
    }

    pub fn set_early_withdrawal_threshold(&mut self, threshold: u64) -> Result<(), RewardError> {
        match self {
            Self::EarlyWithdrawal(ramp) => {
                validate_early_withdrawal_threshold(threshold)?;
                ramp.threshold = threshold;
                Ok(())
            }
            Self::StakeMultiplier(_) => Err(self.unsupported("early_withdrawal_threshold")),
        }
    }

    pub fn set_max_reward_multiplier(&mut self, multiplier: u128) -> Result<(), RewardError> {
        match self {
            Self::StakeMultiplier(stake) => {
                validate_max_reward_multiplier(multiplier)?;
                stake.max_multiplier = multiplier;
                Ok(())
            }
            Self::EarlyWithdrawal(_) => Err(self.unsupported("max_reward_multiplier")),
        }
    }

    pub fn set_smoothing_value(&mut self, value: u128) -> Result<(), RewardError> {
        match self {
            Self::StakeMultiplier(stake) => {
                validate_smoothing_value(value)?;
                stake.smoothing_value = value;
                Ok(())
            }
            Self::EarlyWithdrawal(_) => Err(self.unsupported("smoothing_value")),
        }
    }

    fn unsupported(&self, setting: &'static str) -> RewardError {
        RewardError::UnsupportedForVariant {
            setting,
            variant: self.name(),
        }
    }
}
