//! Cumulative reward-per-unit indices.
//!
//! Each (token, market) pair carries a monotonically non-decreasing index:
//! the amount of `token` one unit of position would have earned since the
//! market was initialised. A user's entitlement for a period is the index
//! movement since their snapshot times the position they held.
//!
//! Updates are split into a pure [`AccrualIndex::plan_step`] and a
//! [`AccrualIndex::commit_step`] so that callers can validate a whole
//! operation before writing anything.

use std::collections::HashMap;

use sluice_core::U256;
use sluice_core::constants::{MAX_BASIS_POINTS, SECONDS_PER_YEAR};
use sluice_core::error::{MathError, RewardError};
use sluice_core::fixed::{index_delta, mul_div};
use sluice_core::types::Address;

use crate::schedule::RewardToken;

/// Index state of one (token, market) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketIndex {
    pub cumulative_reward_per_unit: U256,
    pub time_of_last_update: u64,
}

impl MarketIndex {
    /// A fresh index at zero whose clock starts at `now`.
    pub fn starting_at(now: u64) -> Self {
        Self {
            cumulative_reward_per_unit: U256::zero(),
            time_of_last_update: now,
        }
    }
}

/// A computed but not yet applied index update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketStep {
    pub token: Address,
    pub market: Address,
    /// Index after the step.
    pub index: U256,
    /// Tokens emitted to the market over the step.
    pub amount: u128,
    pub timestamp: u64,
}

/// Market indices and per-user snapshots for every token.
#[derive(Debug, Clone, Default)]
pub struct AccrualIndex {
    markets: HashMap<(Address, Address), MarketIndex>,
    snapshots: HashMap<(Address, Address, Address), U256>,
}

impl AccrualIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index state of (`token`, `market`), if its clock was ever started.
    pub fn get(&self, token: &Address, market: &Address) -> Option<&MarketIndex> {
        self.markets.get(&(*token, *market))
    }

    /// Current cumulative reward per unit, zero if never started.
    pub fn cumulative(&self, token: &Address, market: &Address) -> U256 {
        self.get(token, market)
            .map(|m| m.cumulative_reward_per_unit)
            .unwrap_or_default()
    }

    /// Start the clock of (`token`, `market`) at `now` with a zero index,
    /// replacing any previous state.
    pub fn start(&mut self, token: Address, market: Address, now: u64) {
        self.markets.insert((token, market), MarketIndex::starting_at(now));
    }

    /// Compute the index of (`token`, `market`) at `now`.
    ///
    /// Nothing accrues while the token is paused, the market holds no
    /// position, or the market has no weight for the token; the clock still
    /// advances. Pairs never started behave as if started at `now`.
    pub fn plan_step(
        &self,
        token: &RewardToken,
        market: Address,
        weight: u16,
        total_position: u128,
        now: u64,
    ) -> Result<MarketStep, RewardError> {
        let current = self
            .get(&token.token, &market)
            .copied()
            .unwrap_or_else(|| MarketIndex::starting_at(now));

        if now < current.time_of_last_update {
            return Err(RewardError::TimeWentBackwards {
                now,
                last: current.time_of_last_update,
            });
        }

        let mut step = MarketStep {
            token: token.token,
            market,
            index: current.cumulative_reward_per_unit,
            amount: 0,
            timestamp: now,
        };

        let elapsed = now - current.time_of_last_update;
        if token.paused || total_position == 0 || weight == 0 || elapsed == 0 {
            return Ok(step);
        }

        let rate = token.current_rate(now)?;
        let market_rate = mul_div(rate, weight as u128, MAX_BASIS_POINTS as u128)?;
        let amount = mul_div(market_rate, elapsed as u128, SECONDS_PER_YEAR as u128)?;
        if amount == 0 {
            return Ok(step);
        }

        let delta = index_delta(amount, total_position)?;
        step.index = step
            .index
            .checked_add(delta)
            .ok_or(MathError::Overflow)?;
        step.amount = amount;
        Ok(step)
    }

    /// Apply a step computed by [`plan_step`](Self::plan_step).
    pub fn commit_step(&mut self, step: &MarketStep) {
        self.markets.insert(
            (step.token, step.market),
            MarketIndex {
                cumulative_reward_per_unit: step.index,
                time_of_last_update: step.timestamp,
            },
        );
    }

    /// Index value `user` last accrued (`token`, `market`) at.
    pub fn snapshot(&self, user: &Address, token: &Address, market: &Address) -> U256 {
        self.snapshots
            .get(&(*user, *token, *market))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_snapshot(&mut self, user: Address, token: Address, market: Address, index: U256) {
        self.snapshots.insert((user, token, market), index);
    }

    /// Forget every index and snapshot of `token`.
    pub fn clear_token(&mut self, token: &Address) {
        self.markets.retain(|(t, _), _| t != token);
        self.snapshots.retain(|(_, t, _), _| t != token);
    }
}
