//! Shared fixtures for the integration suites.

use sluice_core::constants::{
    DEFAULT_EARLY_WITHDRAWAL_THRESHOLD, DEFAULT_MAX_REWARD_MULTIPLIER, DEFAULT_SMOOTHING_VALUE,
};
use sluice_core::error::RewardError;
use sluice_core::types::Address;
use sluice_engine::{MemoryReserve, PositionBook, PositionScaling, RewardDistributor};

pub type Distributor = RewardDistributor<PositionBook, MemoryReserve>;

/// Address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address::repeat_byte(seed)
}

/// Caller registered as the authority of every harness market.
pub const AUTHORITY: Address = Address::repeat_byte(0xF1);

/// A distributor plus a clock, with one-call position changes.
pub struct Harness {
    pub distributor: Distributor,
    pub now: u64,
}

impl Harness {
    /// Liquidity-provider distributor with the default ramp.
    pub fn liquidity(start: u64) -> Self {
        let scaling = PositionScaling::early_withdrawal(DEFAULT_EARLY_WITHDRAWAL_THRESHOLD)
            .expect("default threshold is valid");
        Self::with_scaling(scaling, start)
    }

    /// Staker distributor with the default multiplier curve.
    pub fn staking(start: u64) -> Self {
        let scaling = PositionScaling::stake_multiplier(DEFAULT_MAX_REWARD_MULTIPLIER, DEFAULT_SMOOTHING_VALUE)
            .expect("default multiplier is valid");
        Self::with_scaling(scaling, start)
    }

    pub fn with_scaling(scaling: PositionScaling, start: u64) -> Self {
        Self {
            distributor: RewardDistributor::new(PositionBook::new(), MemoryReserve::new(), scaling),
            now: start,
        }
    }

    pub fn advance(&mut self, seconds: u64) {
        self.now += seconds;
    }

    pub fn init_markets(&mut self, markets: &[Address]) {
        for &market in markets {
            self.distributor
                .init_market_start_time(market, AUTHORITY, self.now)
                .expect("market initialises");
        }
    }

    pub fn add_token(&mut self, token: Address, rate: u128, factor: u128, markets: &[Address], weights: &[u16]) {
        self.distributor
            .add_reward_token(token, rate, factor, markets, weights, self.now)
            .expect("token registers");
    }

    /// Set `user`'s position in `market` and report it through the hook.
    pub fn set_position(&mut self, market: Address, user: Address, size: u128) -> Result<(), RewardError> {
        self.distributor.positions_mut().set(market, user, size);
        self.distributor.update_position(AUTHORITY, market, user, self.now)
    }

    pub fn accrue(&mut self, user: Address) -> Result<(), RewardError> {
        self.distributor.accrue_rewards(user, self.now)
    }

    pub fn owed(&self, user: Address, token: Address) -> u128 {
        self.distributor.accrued_rewards(&user, &token)
    }
}

/// `|a - b| <= b * tolerance_bps / 10_000`.
pub fn within_bps(a: u128, b: u128, tolerance_bps: u128) -> bool {
    a.abs_diff(b) <= b / 10_000 * tolerance_bps
}
