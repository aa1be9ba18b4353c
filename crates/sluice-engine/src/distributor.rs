//! The reward distributor.
//!
//! [`RewardDistributor`] owns every piece of accrual state and is the only
//! thing that mutates it. Each public operation runs in two phases: a pure
//! planning phase that computes new indices and user credits and can fail,
//! followed by a commit phase that cannot. An `Err` therefore leaves the
//! distributor exactly as it was.
//!
//! Operations that end in a reserve transfer apply their accounting first
//! and undo it if the transfer is rejected. A claim cannot take back what
//! it already paid, so it reports a rejected transfer per token in its
//! [`ClaimOutcome`] and still returns `Ok`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, warn};

use sluice_core::U256;
use sluice_core::error::{MathError, RewardError};
use sluice_core::fixed::apply_index;
use sluice_core::traits::{FundingReserve, PositionSource};
use sluice_core::types::{Address, RewardEvent};

use crate::index::{AccrualIndex, MarketStep};
use crate::ledger::ClaimLedger;
use crate::scaling::PositionScaling;
use crate::schedule::{EmissionSchedule, RewardToken};
use crate::weights::{WeightTable, validate_weights};

/// Registration data of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketState {
    /// The only caller allowed to report position changes.
    pub authority: Address,
    pub start_time: u64,
    /// Sum of all recorded positions.
    pub total_position: u128,
}

/// Outcome of claiming one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub token: Address,
    pub paid: u128,
    /// Owed amount the reserve could not cover; stays claimable.
    pub shortfall: u128,
    /// Amount whose transfer the reserve rejected; stays claimable.
    pub rejected: u128,
}

/// A user credit computed during planning.
#[derive(Debug, Clone, Copy)]
struct UserCredit {
    token: Address,
    market: Address,
    index: U256,
    amount: u128,
}

/// Everything planned for one (user, market) accrual.
#[derive(Debug, Clone)]
struct MarketAccrual {
    market: Address,
    steps: Vec<MarketStep>,
    credits: Vec<UserCredit>,
}

#[derive(Debug, Clone)]
struct DistributorState {
    schedule: EmissionSchedule,
    weights: WeightTable,
    index: AccrualIndex,
    ledger: ClaimLedger,
    scaling: PositionScaling,
    markets: BTreeMap<Address, MarketState>,
    recorded: HashMap<(Address, Address), u128>,
    events: Vec<RewardEvent>,
}

/// Multi-token, multi-market reward accrual engine.
pub struct RewardDistributor<P, R> {
    positions: P,
    reserve: R,
    state: DistributorState,
}

impl<P: PositionSource, R: FundingReserve> RewardDistributor<P, R> {
    pub fn new(positions: P, reserve: R, scaling: PositionScaling) -> Self {
        info!(variant = scaling.name(), "reward distributor created");
        Self {
            positions,
            reserve,
            state: DistributorState {
                schedule: EmissionSchedule::new(),
                weights: WeightTable::new(),
                index: AccrualIndex::new(),
                ledger: ClaimLedger::new(),
                scaling,
                markets: BTreeMap::new(),
                recorded: HashMap::new(),
                events: Vec::new(),
            },
        }
    }

    // --- collaborators ---

    pub fn positions(&self) -> &P {
        &self.positions
    }

    /// Mutable access to the position source, for hosts that own it.
    pub fn positions_mut(&mut self) -> &mut P {
        &mut self.positions
    }

    pub fn reserve(&self) -> &R {
        &self.reserve
    }

    pub fn reserve_mut(&mut self) -> &mut R {
        &mut self.reserve
    }

    /// Drain the event journal.
    pub fn take_events(&mut self) -> Vec<RewardEvent> {
        std::mem::take(&mut self.state.events)
    }

    // --- markets and positions ---

    /// Register `market` at `now`, naming the one caller allowed to report
    /// its position changes.
    pub fn init_market_start_time(&mut self, market: Address, authority: Address, now: u64) -> Result<(), RewardError> {
        if self.state.markets.contains_key(&market) {
            return Err(RewardError::AlreadyInitializedStartTime(market));
        }

        self.state.markets.insert(
            market,
            MarketState {
                authority,
                start_time: now,
                total_position: 0,
            },
        );
        let tokens: Vec<Address> = self.state.schedule.tokens().iter().map(|t| t.token).collect();
        for token in tokens {
            self.state.index.start(token, market, now);
        }

        info!(%market, %authority, now, "market start time initialised");
        self.state.events.push(RewardEvent::MarketStartTimeInitialized {
            market,
            authority,
            timestamp: now,
        });
        Ok(())
    }

    /// Position-change hook. Accrues `user` in `market` against the position
    /// recorded before the change, then records the position now reported by
    /// the position source.
    pub fn update_position(&mut self, caller: Address, market: Address, user: Address, now: u64) -> Result<(), RewardError> {
        let state = self.market(&market)?;
        if caller != state.authority {
            return Err(RewardError::CallerIsNotAuthorizedMarket { caller, market });
        }

        let previous = self.recorded_position(&user, &market);
        let current = self.positions.position_of(&market, &user);
        let total = state
            .total_position
            .saturating_sub(previous)
            .checked_add(current)
            .ok_or(MathError::Overflow)?;

        let accrual = self.plan_accrual(&user, market, previous, now)?;
        self.check_credits(&user, std::slice::from_ref(&accrual))?;

        self.commit_accrual(user, accrual);
        self.state.scaling.on_position_change(user, market, previous, current, now);
        self.set_recorded(user, market, current);
        self.set_total(market, total);

        debug!(%market, %user, previous, current, total, "position updated");
        self.state.events.push(RewardEvent::PositionUpdated {
            market,
            user,
            previous,
            current,
        });
        Ok(())
    }

    /// Start tracking positions `user` opened before the distributor knew
    /// about them.
    pub fn register_positions(&mut self, user: Address, markets: &[Address], now: u64) -> Result<(), RewardError> {
        let mut seen = BTreeSet::new();
        let mut planned = Vec::with_capacity(markets.len());
        let mut totals: BTreeMap<Address, u128> = BTreeMap::new();

        for &market in markets {
            if !seen.insert(market) {
                return Err(RewardError::DuplicateMarket(market));
            }
            let state = self.market(&market)?;
            let recorded = self.recorded_position(&user, &market);
            if recorded != 0 {
                return Err(RewardError::PositionAlreadyRegistered { user, market, recorded });
            }

            let actual = self.positions.position_of(&market, &user);
            let total = state.total_position.checked_add(actual).ok_or(MathError::Overflow)?;
            totals.insert(market, total);
            planned.push((self.plan_accrual(&user, market, 0, now)?, actual));
        }

        for (accrual, actual) in planned {
            let market = accrual.market;
            self.commit_accrual(user, accrual);
            if actual > 0 {
                self.state.scaling.on_position_change(user, market, 0, actual, now);
                self.set_recorded(user, market, actual);
            }
            if let Some(&total) = totals.get(&market) {
                self.set_total(market, total);
            }

            debug!(%market, %user, position = actual, "position registered");
            self.state.events.push(RewardEvent::PositionRegistered {
                market,
                user,
                position: actual,
            });
        }
        Ok(())
    }

    // --- accrual ---

    /// Accrue `user` in every market where they hold a position.
    pub fn accrue_rewards(&mut self, user: Address, now: u64) -> Result<(), RewardError> {
        let markets: Vec<Address> = self.state.markets.keys().copied().collect();
        let mut planned = Vec::new();
        for market in markets {
            let recorded = self.recorded_position(&user, &market);
            let actual = self.positions.position_of(&market, &user);
            if recorded == 0 && actual == 0 {
                continue;
            }
            self.check_in_sync(user, market, recorded, actual)?;
            planned.push(self.plan_accrual(&user, market, recorded, now)?);
        }

        self.check_credits(&user, &planned)?;
        for accrual in planned {
            self.commit_accrual(user, accrual);
        }
        Ok(())
    }

    /// Accrue `user` in one market.
    pub fn accrue_rewards_for_market(&mut self, market: Address, user: Address, now: u64) -> Result<(), RewardError> {
        self.market(&market)?;
        let recorded = self.recorded_position(&user, &market);
        let actual = self.positions.position_of(&market, &user);
        self.check_in_sync(user, market, recorded, actual)?;

        let accrual = self.plan_accrual(&user, market, recorded, now)?;
        self.check_credits(&user, std::slice::from_ref(&accrual))?;
        self.commit_accrual(user, accrual);
        Ok(())
    }

    // --- claims ---

    /// Accrue `user` everywhere, then pay out `tokens`.
    pub fn claim(&mut self, user: Address, tokens: &[Address], now: u64) -> Result<Vec<ClaimOutcome>, RewardError> {
        self.claim_for(user, user, tokens, now)
    }

    /// Claim on behalf of `user`. Tokens are always paid to `user`; `keeper`
    /// is only recorded in the claim events.
    ///
    /// Owed amounts the reserve cannot cover are reported as a shortfall and
    /// stay owed. A transfer the reserve rejects is reported as `rejected`,
    /// stays owed, and does not stop the other tokens from being paid.
    ///
    /// Errors only before anything is accrued or paid.
    pub fn claim_for(
        &mut self,
        keeper: Address,
        user: Address,
        tokens: &[Address],
        now: u64,
    ) -> Result<Vec<ClaimOutcome>, RewardError> {
        for token in tokens {
            if !self.state.schedule.contains(token) && self.state.ledger.owed(&user, token) == 0 {
                return Err(RewardError::UnknownRewardToken(*token));
            }
        }

        self.accrue_rewards(user, now)?;

        let mut outcomes = Vec::with_capacity(tokens.len());
        for &token in tokens {
            let available = self.reserve.available(&token);
            let settlement = self.state.ledger.settle(user, token, available);
            let mut paid = settlement.paid;
            let mut rejected = 0;

            if paid > 0 {
                match self.reserve.transfer(&token, &user, paid) {
                    Ok(()) => {
                        info!(%token, %user, %keeper, amount = paid, "rewards claimed");
                        self.state.events.push(RewardEvent::RewardClaimed {
                            user,
                            token,
                            amount: paid,
                            keeper,
                        });
                    }
                    Err(e) => {
                        self.state.ledger.credit(user, token, paid);
                        warn!(%token, %user, amount = paid, error = %e, "reward transfer rejected");
                        self.state.events.push(RewardEvent::RewardTransferRejected {
                            token,
                            user,
                            amount: paid,
                            reason: e.to_string(),
                        });
                        rejected = paid;
                        paid = 0;
                    }
                }
            }
            if settlement.shortfall > 0 {
                warn!(%token, %user, shortfall = settlement.shortfall, available, "reserve cannot cover owed rewards");
                self.state.events.push(RewardEvent::RewardTokenShortfall {
                    token,
                    user,
                    shortfall: settlement.shortfall,
                });
            }

            outcomes.push(ClaimOutcome {
                token,
                paid,
                shortfall: settlement.shortfall,
                rejected,
            });
        }
        Ok(outcomes)
    }

    // --- token administration ---

    /// Register a reward token and its initial market weights.
    pub fn add_reward_token(
        &mut self,
        token: Address,
        initial_inflation_rate: u128,
        reduction_factor: u128,
        markets: &[Address],
        weights: &[u16],
        now: u64,
    ) -> Result<(), RewardError> {
        self.state
            .schedule
            .check_register(token, initial_inflation_rate, reduction_factor)?;
        validate_weights(markets, weights)?;
        self.check_initialized(markets)?;

        self.state
            .schedule
            .register(token, initial_inflation_rate, reduction_factor, now)?;
        let initialized: Vec<Address> = self.state.markets.keys().copied().collect();
        for market in initialized {
            self.state.index.start(token, market, now);
        }

        info!(%token, initial_inflation_rate, reduction_factor, "reward token added");
        self.state.events.push(RewardEvent::RewardTokenAdded {
            token,
            initial_inflation_rate,
            reduction_factor,
            timestamp: now,
        });
        self.apply_weights(token, markets, weights)
    }

    /// Remove `token`: accrue it one last time, return whatever the reserve
    /// holds beyond what users are owed to `recipient`, and stop accrual.
    ///
    /// The returned amount is the reserve balance less the owed total, so the
    /// allowance must cover it or the removal fails. Balances already owed
    /// stay claimable. Returns the amount sent back.
    pub fn remove_reward_token(&mut self, token: Address, recipient: Address, now: u64) -> Result<u128, RewardError> {
        let steps = self.plan_token_steps(&token, now)?;
        let checkpoint = self.state.clone();

        self.commit_steps(&steps);
        let total_owed = self.state.ledger.total_unclaimed(&token);
        let returned = self.reserve.balance(&token).saturating_sub(total_owed);

        self.state.schedule.remove(&token)?;
        for market in self.state.weights.clear(&token) {
            self.state
                .events
                .push(RewardEvent::MarketRemovedFromRewards { token, market });
        }
        self.state.index.clear_token(&token);
        self.state.events.push(RewardEvent::RewardTokenRemoved {
            token,
            total_owed,
            returned,
        });

        if returned > 0 {
            if let Err(e) = self.reserve.transfer(&token, &recipient, returned) {
                self.state = checkpoint;
                warn!(%token, error = %e, "returning reward token balance failed");
                return Err(e.into());
            }
        }

        info!(%token, total_owed, returned, %recipient, "reward token removed");
        Ok(returned)
    }

    /// Replace `token`'s market weights after crediting every market under
    /// the old ones.
    pub fn update_weights(&mut self, token: Address, markets: &[Address], weights: &[u16], now: u64) -> Result<(), RewardError> {
        self.state.schedule.get(&token)?;
        validate_weights(markets, weights)?;
        self.check_initialized(markets)?;

        let steps = self.plan_token_steps(&token, now)?;
        self.commit_steps(&steps);
        self.apply_weights(token, markets, weights)
    }

    pub fn update_initial_inflation_rate(&mut self, token: Address, rate: u128, now: u64) -> Result<(), RewardError> {
        let mut updated = self.state.schedule.get(&token)?.clone();
        updated.set_initial_inflation_rate(rate, now)?;
        self.replace_token_params(updated, now)?;

        info!(%token, rate, "initial inflation rate updated");
        self.state
            .events
            .push(RewardEvent::InitialInflationRateUpdated { token, rate });
        Ok(())
    }

    pub fn update_reduction_factor(&mut self, token: Address, factor: u128, now: u64) -> Result<(), RewardError> {
        let mut updated = self.state.schedule.get(&token)?.clone();
        updated.set_reduction_factor(factor, now)?;
        self.replace_token_params(updated, now)?;

        info!(%token, factor, "reduction factor updated");
        self.state
            .events
            .push(RewardEvent::ReductionFactorUpdated { token, factor });
        Ok(())
    }

    /// Pause or resume accrual of `token`. Accrual up to `now` is credited
    /// under the previous setting either way.
    pub fn set_paused(&mut self, token: Address, paused: bool, now: u64) -> Result<(), RewardError> {
        let mut updated = self.state.schedule.get(&token)?.clone();
        updated.paused = paused;
        self.replace_token_params(updated, now)?;

        info!(%token, paused, "reward token pause toggled");
        self.state
            .events
            .push(RewardEvent::RewardTokenPaused { token, paused });
        Ok(())
    }

    // --- variant administration ---

    pub fn set_early_withdrawal_threshold(&mut self, threshold: u64) -> Result<(), RewardError> {
        self.state.scaling.set_early_withdrawal_threshold(threshold)?;
        info!(threshold, "early withdrawal threshold updated");
        self.state
            .events
            .push(RewardEvent::EarlyWithdrawalThresholdUpdated { threshold });
        Ok(())
    }

    pub fn set_max_reward_multiplier(&mut self, multiplier: u128) -> Result<(), RewardError> {
        self.state.scaling.set_max_reward_multiplier(multiplier)?;
        info!(multiplier, "max reward multiplier updated");
        self.state
            .events
            .push(RewardEvent::MaxRewardMultiplierUpdated { multiplier });
        Ok(())
    }

    pub fn set_smoothing_value(&mut self, value: u128) -> Result<(), RewardError> {
        self.state.scaling.set_smoothing_value(value)?;
        info!(value, "smoothing value updated");
        self.state
            .events
            .push(RewardEvent::SmoothingValueUpdated { value });
        Ok(())
    }

    // --- views ---

    pub fn reward_tokens(&self) -> Vec<Address> {
        self.state.schedule.tokens().iter().map(|t| t.token).collect()
    }

    pub fn markets(&self) -> Vec<Address> {
        self.state.markets.keys().copied().collect()
    }

    pub fn market_state(&self, market: &Address) -> Option<MarketState> {
        self.state.markets.get(market).copied()
    }

    pub fn cumulative_reward_per_unit(&self, token: &Address, market: &Address) -> U256 {
        self.state.index.cumulative(token, market)
    }

    pub fn time_of_last_update(&self, token: &Address, market: &Address) -> Option<u64> {
        self.state.index.get(token, market).map(|m| m.time_of_last_update)
    }

    pub fn current_rate(&self, token: &Address, now: u64) -> Result<u128, RewardError> {
        Ok(self.state.schedule.get(token)?.current_rate(now)?)
    }

    pub fn is_paused(&self, token: &Address) -> Result<bool, RewardError> {
        Ok(self.state.schedule.get(token)?.paused)
    }

    pub fn weight(&self, token: &Address, market: &Address) -> u16 {
        self.state.weights.weight(token, market)
    }

    /// Markets with a non-zero weight for `token`.
    pub fn active_markets(&self, token: &Address) -> Vec<Address> {
        self.state.weights.active_markets(token)
    }

    /// Sum of `token`'s weights: 10_000 while registered, 0 otherwise.
    pub fn total_weight(&self, token: &Address) -> u32 {
        self.state.weights.total(token)
    }

    pub fn accrued_rewards(&self, user: &Address, token: &Address) -> u128 {
        self.state.ledger.owed(user, token)
    }

    pub fn total_unclaimed(&self, token: &Address) -> u128 {
        self.state.ledger.total_unclaimed(token)
    }

    pub fn recorded_position(&self, user: &Address, market: &Address) -> u128 {
        self.state.recorded.get(&(*user, *market)).copied().unwrap_or(0)
    }

    pub fn total_position(&self, market: &Address) -> u128 {
        self.state
            .markets
            .get(market)
            .map(|m| m.total_position)
            .unwrap_or(0)
    }

    pub fn withdraw_timer_start(&self, user: &Address, market: &Address) -> u64 {
        self.state.scaling.withdraw_timer_start(user, market)
    }

    pub fn multiplier_start_time(&self, user: &Address, market: &Address) -> u64 {
        self.state.scaling.multiplier_start_time(user, market)
    }

    pub fn reward_multiplier(&self, user: &Address, market: &Address, now: u64) -> Result<u128, RewardError> {
        self.state.scaling.reward_multiplier(user, market, now)
    }

    pub fn scaling(&self) -> &PositionScaling {
        &self.state.scaling
    }

    /// Scaled amount of each token the next accrual of `user` in `market`
    /// would credit, without changing anything.
    pub fn preview_accrual(&self, user: &Address, market: &Address, now: u64) -> Result<Vec<(Address, u128)>, RewardError> {
        self.market(market)?;
        let recorded = self.recorded_position(user, market);
        let accrual = self.plan_accrual(user, *market, recorded, now)?;
        Ok(accrual.credits.iter().map(|c| (c.token, c.amount)).collect())
    }

    /// Index (`token`, `market`) would reach if updated at `now`.
    pub fn preview_index(&self, token: &Address, market: &Address, now: u64) -> Result<U256, RewardError> {
        let entry = self.state.schedule.get(token)?;
        let state = self.market(market)?;
        let step = self.state.index.plan_step(
            entry,
            *market,
            self.state.weights.weight(token, market),
            state.total_position,
            now,
        )?;
        Ok(step.index)
    }

    // --- planning ---

    fn market(&self, market: &Address) -> Result<MarketState, RewardError> {
        self.state
            .markets
            .get(market)
            .copied()
            .ok_or(RewardError::UninitializedMarket(*market))
    }

    fn check_initialized(&self, markets: &[Address]) -> Result<(), RewardError> {
        for market in markets {
            self.market(market)?;
        }
        Ok(())
    }

    fn check_in_sync(&self, user: Address, market: Address, recorded: u128, actual: u128) -> Result<(), RewardError> {
        if recorded != actual {
            return Err(RewardError::UserPositionMismatch {
                user,
                market,
                recorded,
                actual,
            });
        }
        Ok(())
    }

    /// Steps of every registered token in `market`.
    fn plan_market_steps(&self, market: Address, now: u64) -> Result<Vec<MarketStep>, RewardError> {
        let total = self.total_position(&market);
        self.state
            .schedule
            .tokens()
            .iter()
            .map(|token| {
                let weight = self.state.weights.weight(&token.token, &market);
                self.state.index.plan_step(token, market, weight, total, now)
            })
            .collect()
    }

    /// Steps of `token` in every initialised market.
    fn plan_token_steps(&self, token: &Address, now: u64) -> Result<Vec<MarketStep>, RewardError> {
        let entry = self.state.schedule.get(token)?;
        self.state
            .markets
            .iter()
            .map(|(&market, state)| {
                let weight = self.state.weights.weight(token, &market);
                self.state
                    .index
                    .plan_step(entry, market, weight, state.total_position, now)
            })
            .collect()
    }

    /// Market steps plus `user`'s scaled credits for holding `position`
    /// since their last snapshot.
    fn plan_accrual(&self, user: &Address, market: Address, position: u128, now: u64) -> Result<MarketAccrual, RewardError> {
        let steps = self.plan_market_steps(market, now)?;
        let mut credits = Vec::with_capacity(steps.len());
        for step in &steps {
            let snapshot = self.state.index.snapshot(user, &step.token, &market);
            let delta = step.index.saturating_sub(snapshot);
            let raw = apply_index(delta, position)?;
            let amount = self.state.scaling.scale(raw, user, &market, now)?;
            credits.push(UserCredit {
                token: step.token,
                market,
                index: step.index,
                amount,
            });
        }
        Ok(MarketAccrual { market, steps, credits })
    }

    fn check_credits(&self, user: &Address, planned: &[MarketAccrual]) -> Result<(), RewardError> {
        let credits = planned
            .iter()
            .flat_map(|a| a.credits.iter().map(|c| (c.token, c.amount)));
        Ok(self.state.ledger.check_credits(user, credits)?)
    }

    /// Re-validate `updated` against the schedule, accrue its markets under
    /// the current parameters, then swap the parameters in.
    fn replace_token_params(&mut self, updated: RewardToken, now: u64) -> Result<(), RewardError> {
        let steps = self.plan_token_steps(&updated.token, now)?;
        self.commit_steps(&steps);
        let entry = self.state.schedule.get_mut(&updated.token)?;
        *entry = updated;
        Ok(())
    }

    // --- commit ---

    fn commit_steps(&mut self, steps: &[MarketStep]) {
        for step in steps {
            self.state.index.commit_step(step);
            if step.amount > 0 {
                debug!(token = %step.token, market = %step.market, amount = step.amount, "market accrued");
                self.state.events.push(RewardEvent::RewardAccruedToMarket {
                    token: step.token,
                    market: step.market,
                    amount: step.amount,
                });
            }
        }
    }

    fn commit_accrual(&mut self, user: Address, accrual: MarketAccrual) {
        self.commit_steps(&accrual.steps);
        for credit in accrual.credits {
            self.state
                .index
                .set_snapshot(user, credit.token, credit.market, credit.index);
            if credit.amount == 0 {
                continue;
            }
            self.state.ledger.credit(user, credit.token, credit.amount);
            debug!(%user, token = %credit.token, market = %credit.market, amount = credit.amount, "user accrued");
            self.state.events.push(RewardEvent::RewardAccruedToUser {
                user,
                token: credit.token,
                market: credit.market,
                amount: credit.amount,
            });
        }
    }

    fn apply_weights(&mut self, token: Address, markets: &[Address], weights: &[u16]) -> Result<(), RewardError> {
        let change = self.state.weights.replace(token, markets, weights)?;
        for (market, weight) in change.assigned {
            self.state
                .events
                .push(RewardEvent::NewWeight { token, market, weight });
        }
        for market in change.removed {
            info!(%token, %market, "market removed from rewards");
            self.state
                .events
                .push(RewardEvent::MarketRemovedFromRewards { token, market });
        }
        Ok(())
    }

    fn set_recorded(&mut self, user: Address, market: Address, position: u128) {
        if position == 0 {
            self.state.recorded.remove(&(user, market));
        } else {
            self.state.recorded.insert((user, market), position);
        }
    }

    fn set_total(&mut self, market: Address, total: u128) {
        if let Some(state) = self.state.markets.get_mut(&market) {
            state.total_position = total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryReserve, PositionBook};
    use sluice_core::constants::{DEFAULT_EARLY_WITHDRAWAL_THRESHOLD, SECONDS_PER_DAY, WAD};
    use sluice_core::error::ReserveError;

    const TOKEN: Address = Address::repeat_byte(0xAA);
    const MARKET: Address = Address::repeat_byte(0x01);
    const OTHER_MARKET: Address = Address::repeat_byte(0x02);
    const AMM: Address = Address::repeat_byte(0xF1);
    const ALICE: Address = Address::repeat_byte(0x0A);
    const BOB: Address = Address::repeat_byte(0x0B);
    const GOV: Address = Address::repeat_byte(0x60);
    const DAY: u64 = SECONDS_PER_DAY;
    const RATE: u128 = 365 * WAD;

    type Distributor = RewardDistributor<PositionBook, MemoryReserve>;

    fn distributor() -> Distributor {
        let scaling = PositionScaling::early_withdrawal(DEFAULT_EARLY_WITHDRAWAL_THRESHOLD).unwrap();
        let mut d = RewardDistributor::new(PositionBook::new(), MemoryReserve::new(), scaling);
        d.init_market_start_time(MARKET, AMM, 0).unwrap();
        d.init_market_start_time(OTHER_MARKET, AMM, 0).unwrap();
        d.add_reward_token(TOKEN, RATE, WAD, &[MARKET], &[10_000], 0).unwrap();
        d
    }

    fn deposit(d: &mut Distributor, user: Address, size: u128, now: u64) {
        d.positions_mut().set(MARKET, user, size);
        d.update_position(AMM, MARKET, user, now).unwrap();
    }

    // --- markets ---

    #[test]
    fn market_init_is_once_only() {
        let mut d = distributor();
        assert_eq!(
            d.init_market_start_time(MARKET, AMM, 10).unwrap_err(),
            RewardError::AlreadyInitializedStartTime(MARKET)
        );
    }

    #[test]
    fn only_the_market_authority_reports_positions() {
        let mut d = distributor();
        d.positions_mut().set(MARKET, ALICE, 100);
        assert_eq!(
            d.update_position(ALICE, MARKET, ALICE, 0).unwrap_err(),
            RewardError::CallerIsNotAuthorizedMarket { caller: ALICE, market: MARKET }
        );
        assert_eq!(d.recorded_position(&ALICE, &MARKET), 0);
    }

    #[test]
    fn weights_on_uninitialized_market_rejected() {
        let mut d = distributor();
        let unknown = Address::repeat_byte(0x03);
        assert_eq!(
            d.update_weights(TOKEN, &[unknown], &[10_000], 0).unwrap_err(),
            RewardError::UninitializedMarket(unknown)
        );
        assert_eq!(d.weight(&TOKEN, &MARKET), 10_000);
    }

    #[test]
    fn reweighting_moves_the_active_set() {
        let mut d = distributor();
        assert_eq!(d.active_markets(&TOKEN), vec![MARKET]);
        d.update_weights(TOKEN, &[MARKET, OTHER_MARKET], &[0, 10_000], DAY).unwrap();
        assert_eq!(d.active_markets(&TOKEN), vec![OTHER_MARKET]);
        assert_eq!(d.total_weight(&TOKEN), 10_000);

        d.remove_reward_token(TOKEN, GOV, 2 * DAY).unwrap();
        assert!(d.active_markets(&TOKEN).is_empty());
        assert_eq!(d.total_weight(&TOKEN), 0);
    }

    // --- accrual ---

    #[test]
    fn single_holder_earns_full_emission_after_ramp() {
        let mut d = distributor();
        deposit(&mut d, ALICE, 10 * WAD, 0);
        d.accrue_rewards(ALICE, 20 * DAY).unwrap();
        // Accrued once, after the ramp has fully elapsed.
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 20 * WAD);
        assert_eq!(d.total_unclaimed(&TOKEN), 20 * WAD);
    }

    #[test]
    fn ramp_discounts_early_accrual() {
        let mut d = distributor();
        deposit(&mut d, ALICE, 10 * WAD, 0);
        d.accrue_rewards(ALICE, 5 * DAY).unwrap();
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 5 * WAD / 2);
    }

    #[test]
    fn holders_split_by_position() {
        let mut d = distributor();
        deposit(&mut d, ALICE, 30 * WAD, 0);
        deposit(&mut d, BOB, 10 * WAD, 0);
        d.accrue_rewards(ALICE, 40 * DAY).unwrap();
        d.accrue_rewards(BOB, 40 * DAY).unwrap();
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 30 * WAD);
        assert_eq!(d.accrued_rewards(&BOB, &TOKEN), 10 * WAD);
        assert_eq!(d.total_position(&MARKET), 40 * WAD);
    }

    #[test]
    fn unsynced_position_cannot_accrue() {
        let mut d = distributor();
        d.positions_mut().set(MARKET, ALICE, 100);
        assert_eq!(
            d.accrue_rewards(ALICE, DAY).unwrap_err(),
            RewardError::UserPositionMismatch { user: ALICE, market: MARKET, recorded: 0, actual: 100 }
        );
    }

    #[test]
    fn register_positions_syncs_once() {
        let mut d = distributor();
        d.positions_mut().set(MARKET, ALICE, 100);
        d.register_positions(ALICE, &[MARKET], DAY).unwrap();
        assert_eq!(d.recorded_position(&ALICE, &MARKET), 100);
        assert_eq!(d.total_position(&MARKET), 100);
        assert_eq!(d.withdraw_timer_start(&ALICE, &MARKET), DAY);
        assert_eq!(
            d.register_positions(ALICE, &[MARKET], DAY).unwrap_err(),
            RewardError::PositionAlreadyRegistered { user: ALICE, market: MARKET, recorded: 100 }
        );
    }

    #[test]
    fn register_positions_is_all_or_nothing() {
        let mut d = distributor();
        d.positions_mut().set(MARKET, ALICE, 100);
        d.positions_mut().set(OTHER_MARKET, ALICE, 50);
        let unknown = Address::repeat_byte(0x03);
        assert!(d.register_positions(ALICE, &[MARKET, unknown], DAY).is_err());
        assert_eq!(d.recorded_position(&ALICE, &MARKET), 0);
        assert!(matches!(
            d.register_positions(ALICE, &[MARKET, MARKET], DAY),
            Err(RewardError::DuplicateMarket(_))
        ));
    }

    #[test]
    fn time_going_backwards_is_rejected() {
        let mut d = distributor();
        deposit(&mut d, ALICE, WAD, 10 * DAY);
        assert!(matches!(
            d.accrue_rewards(ALICE, DAY),
            Err(RewardError::TimeWentBackwards { .. })
        ));
    }

    #[test]
    fn preview_matches_accrual() {
        let mut d = distributor();
        deposit(&mut d, ALICE, 4 * WAD, 0);
        let preview = d.preview_accrual(&ALICE, &MARKET, 3 * DAY).unwrap();
        let index = d.preview_index(&TOKEN, &MARKET, 3 * DAY).unwrap();
        d.accrue_rewards(ALICE, 3 * DAY).unwrap();
        assert_eq!(preview, vec![(TOKEN, d.accrued_rewards(&ALICE, &TOKEN))]);
        assert_eq!(index, d.cumulative_reward_per_unit(&TOKEN, &MARKET));
    }

    // --- admin ---

    #[test]
    fn pause_stops_accrual() {
        let mut d = distributor();
        deposit(&mut d, ALICE, WAD, 0);
        d.set_paused(TOKEN, true, 20 * DAY).unwrap();
        let before = d.cumulative_reward_per_unit(&TOKEN, &MARKET);
        d.accrue_rewards(ALICE, 30 * DAY).unwrap();
        assert_eq!(d.cumulative_reward_per_unit(&TOKEN, &MARKET), before);

        d.set_paused(TOKEN, false, 40 * DAY).unwrap();
        d.accrue_rewards(ALICE, 41 * DAY).unwrap();
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 21 * WAD);
    }

    #[test]
    fn weight_change_credits_old_weights_first() {
        let mut d = distributor();
        deposit(&mut d, ALICE, WAD, 0);
        d.update_weights(TOKEN, &[MARKET, OTHER_MARKET], &[5_000, 5_000], 20 * DAY).unwrap();
        let at_change = d.cumulative_reward_per_unit(&TOKEN, &MARKET);
        assert_eq!(at_change, U256::from(20 * WAD));
        d.accrue_rewards(ALICE, 40 * DAY).unwrap();
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 30 * WAD);
    }

    #[test]
    fn rejected_rate_update_changes_nothing() {
        let mut d = distributor();
        deposit(&mut d, ALICE, WAD, 0);
        let events_before = d.take_events().len();
        assert!(events_before > 0);
        assert!(d.update_initial_inflation_rate(TOKEN, u128::MAX, DAY).is_err());
        assert_eq!(d.time_of_last_update(&TOKEN, &MARKET), Some(0));
        assert!(d.take_events().is_empty());
    }

    #[test]
    fn variant_setters_emit_events() {
        let mut d = distributor();
        d.take_events();
        d.set_early_withdrawal_threshold(DAY).unwrap();
        assert_eq!(
            d.take_events(),
            vec![RewardEvent::EarlyWithdrawalThresholdUpdated { threshold: DAY }]
        );
        assert!(d.set_smoothing_value(50 * WAD).is_err());
    }

    // --- claims ---

    #[test]
    fn claim_pays_and_zeroes() {
        let mut d = distributor();
        d.reserve_mut().fund(TOKEN, 1_000 * WAD);
        deposit(&mut d, ALICE, WAD, 0);
        let outcome = d.claim(ALICE, &[TOKEN], 20 * DAY).unwrap();
        assert_eq!(
            outcome,
            vec![ClaimOutcome { token: TOKEN, paid: 20 * WAD, shortfall: 0, rejected: 0 }]
        );
        assert_eq!(d.reserve().received(&TOKEN, &ALICE), 20 * WAD);
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 0);
    }

    #[test]
    fn claim_with_shortfall_keeps_remainder() {
        let mut d = distributor();
        d.reserve_mut().fund(TOKEN, 5 * WAD);
        deposit(&mut d, ALICE, WAD, 0);
        let outcome = d.claim(ALICE, &[TOKEN], 20 * DAY).unwrap();
        assert_eq!(outcome[0].paid, 5 * WAD);
        assert_eq!(outcome[0].shortfall, 15 * WAD);
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 15 * WAD);
        assert!(d.take_events().iter().any(|e| matches!(
            e,
            RewardEvent::RewardTokenShortfall { shortfall, .. } if *shortfall == 15 * WAD
        )));
    }

    #[test]
    fn rejected_transfer_keeps_balance_owed() {
        let mut d = distributor();
        d.reserve_mut().fund(TOKEN, 100 * WAD);
        d.reserve_mut().set_frozen(TOKEN, true);
        deposit(&mut d, ALICE, WAD, 0);
        let outcome = d.claim(ALICE, &[TOKEN], 20 * DAY).unwrap();
        assert_eq!(
            outcome,
            vec![ClaimOutcome { token: TOKEN, paid: 0, shortfall: 0, rejected: 20 * WAD }]
        );
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 20 * WAD);
        assert_eq!(d.total_unclaimed(&TOKEN), 20 * WAD);
        assert_eq!(d.reserve().received(&TOKEN, &ALICE), 0);
    }

    #[test]
    fn one_rejected_token_does_not_block_the_others() {
        const SECOND: Address = Address::repeat_byte(0xBB);
        let mut d = distributor();
        d.add_reward_token(SECOND, RATE, WAD, &[MARKET], &[10_000], 0).unwrap();
        d.reserve_mut().fund(TOKEN, 100 * WAD);
        d.reserve_mut().fund(SECOND, 100 * WAD);
        d.reserve_mut().set_frozen(SECOND, true);
        deposit(&mut d, ALICE, WAD, 0);
        d.take_events();

        let outcome = d.claim(ALICE, &[TOKEN, SECOND], 20 * DAY).unwrap();
        assert_eq!(
            outcome,
            vec![
                ClaimOutcome { token: TOKEN, paid: 20 * WAD, shortfall: 0, rejected: 0 },
                ClaimOutcome { token: SECOND, paid: 0, shortfall: 0, rejected: 20 * WAD },
            ]
        );
        assert_eq!(d.reserve().received(&TOKEN, &ALICE), 20 * WAD);
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 0);
        assert_eq!(d.accrued_rewards(&ALICE, &SECOND), 20 * WAD);
        assert_eq!(d.total_unclaimed(&SECOND), 20 * WAD);
        assert!(d.take_events().iter().any(|e| matches!(
            e,
            RewardEvent::RewardTransferRejected { token, amount, .. } if *token == SECOND && *amount == 20 * WAD
        )));

        // Once the reserve accepts again the held-back balance pays out.
        d.reserve_mut().set_frozen(SECOND, false);
        let outcome = d.claim(ALICE, &[TOKEN, SECOND], 20 * DAY).unwrap();
        assert_eq!(outcome[1].paid, 20 * WAD);
        assert_eq!(d.reserve().received(&SECOND, &ALICE), 20 * WAD);
        assert_eq!(d.total_unclaimed(&SECOND), 0);
    }

    #[test]
    fn keeper_claim_pays_the_user() {
        let mut d = distributor();
        d.reserve_mut().fund(TOKEN, 100 * WAD);
        deposit(&mut d, ALICE, WAD, 0);
        d.claim_for(BOB, ALICE, &[TOKEN], 20 * DAY).unwrap();
        assert_eq!(d.reserve().received(&TOKEN, &ALICE), 20 * WAD);
        assert_eq!(d.reserve().received(&TOKEN, &BOB), 0);
    }

    #[test]
    fn claim_of_unknown_token_rejected() {
        let mut d = distributor();
        let stranger = Address::repeat_byte(0xCC);
        assert_eq!(
            d.claim(ALICE, &[stranger], DAY).unwrap_err(),
            RewardError::UnknownRewardToken(stranger)
        );
    }

    // --- removal ---

    #[test]
    fn failed_removal_restores_state() {
        let mut d = distributor();
        d.reserve_mut().fund(TOKEN, 100 * WAD);
        deposit(&mut d, ALICE, WAD, 0);
        d.reserve_mut().set_frozen(TOKEN, true);
        assert!(d.remove_reward_token(TOKEN, GOV, 20 * DAY).is_err());
        assert_eq!(d.reward_tokens(), vec![TOKEN]);
        assert_eq!(d.weight(&TOKEN, &MARKET), 10_000);
        assert_eq!(d.time_of_last_update(&TOKEN, &MARKET), Some(0));
    }

    #[test]
    fn removal_returns_balance_beyond_owed() {
        let mut d = distributor();
        d.reserve_mut().fund(TOKEN, 100 * WAD);
        d.reserve_mut().set_allowance(TOKEN, 90 * WAD);
        deposit(&mut d, ALICE, WAD, 0);
        d.accrue_rewards(ALICE, 20 * DAY).unwrap();
        let returned = d.remove_reward_token(TOKEN, GOV, 20 * DAY).unwrap();
        assert_eq!(returned, 80 * WAD);
        assert_eq!(d.reserve().received(&TOKEN, &GOV), 80 * WAD);
        assert_eq!(d.reserve().balance(&TOKEN), 20 * WAD);
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), 20 * WAD);
    }

    #[test]
    fn removal_beyond_allowance_fails() {
        let mut d = distributor();
        d.reserve_mut().fund(TOKEN, 100 * WAD);
        d.reserve_mut().set_allowance(TOKEN, 50 * WAD);
        deposit(&mut d, ALICE, WAD, 0);
        d.accrue_rewards(ALICE, 20 * DAY).unwrap();
        assert!(matches!(
            d.remove_reward_token(TOKEN, GOV, 20 * DAY),
            Err(RewardError::Reserve(ReserveError::InsufficientFunds { .. }))
        ));
        assert_eq!(d.reward_tokens(), vec![TOKEN]);
        assert_eq!(d.reserve().balance(&TOKEN), 100 * WAD);
    }

    #[test]
    fn removed_token_can_be_added_again() {
        let mut d = distributor();
        deposit(&mut d, ALICE, WAD, 0);
        d.remove_reward_token(TOKEN, GOV, 20 * DAY).unwrap();
        d.add_reward_token(TOKEN, RATE, WAD, &[MARKET], &[10_000], 30 * DAY).unwrap();
        assert_eq!(d.cumulative_reward_per_unit(&TOKEN, &MARKET), U256::zero());
        d.accrue_rewards(ALICE, 31 * DAY).unwrap();
        // The removed interval is never credited.
        assert_eq!(d.accrued_rewards(&ALICE, &TOKEN), WAD);
    }
}
