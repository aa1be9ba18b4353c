//! Scenario scripts and their replay.
//!
//! A scenario is a JSON document with a start time and an ordered list of
//! steps. Amounts are decimal strings (they routinely exceed 64 bits) and
//! may use an `e` exponent, e.g. `"1463753e18"`.

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use sluice_core::types::{Address, RewardEvent};
use sluice_engine::{MemoryReserve, PositionBook, RewardDistributor};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Unix time of the first step.
    pub start: u64,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    InitMarket {
        market: Address,
        authority: Address,
    },
    AddToken {
        token: Address,
        #[serde(deserialize_with = "amount")]
        initial_inflation_rate: u128,
        #[serde(deserialize_with = "amount")]
        reduction_factor: u128,
        markets: Vec<Address>,
        weights: Vec<u16>,
    },
    FundReserve {
        token: Address,
        #[serde(deserialize_with = "amount")]
        amount: u128,
    },
    /// Change a position in the book without reporting it.
    SetPosition {
        market: Address,
        user: Address,
        #[serde(deserialize_with = "amount")]
        size: u128,
    },
    /// Report a position change through the market hook.
    UpdatePosition {
        caller: Address,
        market: Address,
        user: Address,
    },
    /// `SetPosition` followed by `UpdatePosition` from the market authority.
    Deposit {
        market: Address,
        user: Address,
        #[serde(deserialize_with = "amount")]
        size: u128,
    },
    RegisterPositions {
        user: Address,
        markets: Vec<Address>,
    },
    Accrue {
        user: Address,
        #[serde(default)]
        market: Option<Address>,
    },
    Claim {
        user: Address,
        tokens: Vec<Address>,
        #[serde(default)]
        keeper: Option<Address>,
    },
    UpdateWeights {
        token: Address,
        markets: Vec<Address>,
        weights: Vec<u16>,
    },
    Pause {
        token: Address,
        paused: bool,
    },
    RemoveToken {
        token: Address,
        recipient: Address,
    },
    Advance {
        seconds: u64,
    },
}

/// Parse `"123"`, `"1_000"` or `"1463753e18"` into a `u128`.
pub fn parse_amount(raw: &str) -> Result<u128> {
    let cleaned = raw.trim().replace('_', "");
    let (mantissa, exponent) = match cleaned.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<u32>().with_context(|| format!("bad exponent in {raw:?}"))?),
        None => (cleaned.as_str(), 0),
    };
    let base: u128 = mantissa
        .parse()
        .with_context(|| format!("bad amount {raw:?}"))?;
    let scale = 10u128
        .checked_pow(exponent)
        .with_context(|| format!("exponent too large in {raw:?}"))?;
    base.checked_mul(scale)
        .with_context(|| format!("amount {raw:?} overflows u128"))
}

fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_amount(&raw).map_err(serde::de::Error::custom)
}

/// Final balances printed after a replay.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Balance {
    pub user: Address,
    pub token: Address,
    /// Owed but unclaimed, as a decimal string.
    pub owed: String,
    pub received: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub finished_at: u64,
    pub events: Vec<RewardEvent>,
    pub balances: Vec<Balance>,
}

/// Replay `scenario` against `distributor`, stopping at the first failed step.
pub fn replay(
    distributor: &mut RewardDistributor<PositionBook, MemoryReserve>,
    scenario: &Scenario,
) -> Result<Report> {
    let mut now = scenario.start;
    let mut users = BTreeSet::new();
    let mut tokens = BTreeSet::new();
    let mut events = Vec::new();

    for (i, step) in scenario.steps.iter().enumerate() {
        apply(distributor, step, &mut now, &mut users, &mut tokens)
            .with_context(|| format!("step {i} failed: {step:?}"))?;
        events.extend(distributor.take_events());
    }

    let mut balances = Vec::new();
    for user in &users {
        for token in &tokens {
            let owed = distributor.accrued_rewards(user, token);
            let received = distributor.reserve().received(token, user);
            if owed == 0 && received == 0 {
                continue;
            }
            balances.push(Balance {
                user: *user,
                token: *token,
                owed: owed.to_string(),
                received: received.to_string(),
            });
        }
    }

    info!(steps = scenario.steps.len(), events = events.len(), "scenario replayed");
    Ok(Report {
        finished_at: now,
        events,
        balances,
    })
}

fn apply(
    d: &mut RewardDistributor<PositionBook, MemoryReserve>,
    step: &Step,
    now: &mut u64,
    users: &mut BTreeSet<Address>,
    tokens: &mut BTreeSet<Address>,
) -> Result<()> {
    match step {
        Step::InitMarket { market, authority } => d.init_market_start_time(*market, *authority, *now)?,
        Step::AddToken {
            token,
            initial_inflation_rate,
            reduction_factor,
            markets,
            weights,
        } => {
            tokens.insert(*token);
            d.add_reward_token(*token, *initial_inflation_rate, *reduction_factor, markets, weights, *now)?;
        }
        Step::FundReserve { token, amount } => d.reserve_mut().fund(*token, *amount),
        Step::SetPosition { market, user, size } => {
            users.insert(*user);
            d.positions_mut().set(*market, *user, *size);
        }
        Step::UpdatePosition { caller, market, user } => {
            users.insert(*user);
            d.update_position(*caller, *market, *user, *now)?;
        }
        Step::Deposit { market, user, size } => {
            let Some(state) = d.market_state(market) else {
                bail!("market {market} is not initialised");
            };
            users.insert(*user);
            d.positions_mut().set(*market, *user, *size);
            d.update_position(state.authority, *market, *user, *now)?;
        }
        Step::RegisterPositions { user, markets } => {
            users.insert(*user);
            d.register_positions(*user, markets, *now)?;
        }
        Step::Accrue { user, market } => match market {
            Some(market) => d.accrue_rewards_for_market(*market, *user, *now)?,
            None => d.accrue_rewards(*user, *now)?,
        },
        Step::Claim { user, tokens: claimed, keeper } => {
            users.insert(*user);
            d.claim_for(keeper.unwrap_or(*user), *user, claimed, *now)?;
        }
        Step::UpdateWeights { token, markets, weights } => d.update_weights(*token, markets, weights, *now)?,
        Step::Pause { token, paused } => d.set_paused(*token, *paused, *now)?,
        Step::RemoveToken { token, recipient } => {
            users.insert(*recipient);
            d.remove_reward_token(*token, *recipient, *now)?;
        }
        Step::Advance { seconds } => {
            *now = now
                .checked_add(*seconds)
                .context("clock overflow")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_engine::DistributorConfig;

    #[test]
    fn amounts_accept_exponents() {
        assert_eq!(parse_amount("1463753e18").unwrap(), 1_463_753_000_000_000_000_000_000);
        assert_eq!(parse_amount("1_000").unwrap(), 1_000);
        assert!(parse_amount("1e40").is_err());
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn replays_a_small_scenario() {
        let json = r#"{
            "start": 1700000000,
            "steps": [
                { "init_market": { "market": "0x0101010101010101010101010101010101010101",
                                   "authority": "0xf1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1f1" } },
                { "add_token": { "token": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                                 "initial_inflation_rate": "365e18",
                                 "reduction_factor": "1e18",
                                 "markets": ["0x0101010101010101010101010101010101010101"],
                                 "weights": [10000] } },
                { "fund_reserve": { "token": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "amount": "1000e18" } },
                { "deposit": { "market": "0x0101010101010101010101010101010101010101",
                               "user": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a", "size": "1e18" } },
                { "advance": { "seconds": 1728000 } },
                { "claim": { "user": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a",
                             "tokens": ["0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"] } }
            ]
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        let mut d = DistributorConfig::default()
            .build(PositionBook::new(), MemoryReserve::new())
            .unwrap();

        let report = replay(&mut d, &scenario).unwrap();
        assert_eq!(report.finished_at, 1_700_000_000 + 1_728_000);
        assert_eq!(report.balances.len(), 1);
        assert_eq!(report.balances[0].received, "20000000000000000000");
        assert_eq!(report.balances[0].owed, "0");
    }

    #[test]
    fn failing_step_is_reported() {
        let json = r#"{ "start": 0, "steps": [ { "accrue": { "user": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a",
                                                               "market": "0x0101010101010101010101010101010101010101" } } ] }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        let mut d = DistributorConfig::default()
            .build(PositionBook::new(), MemoryReserve::new())
            .unwrap();
        let err = replay(&mut d, &scenario).unwrap_err();
        assert!(err.to_string().contains("step 0 failed"));
    }
}
