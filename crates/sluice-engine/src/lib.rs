//! # sluice-engine — Reward accrual for the Sluice distributor.
//!
//! Pure integer engine. Given a decaying per-token emission schedule and
//! per-market weights, it credits position holders through cumulative
//! reward-per-unit indices, so no operation iterates over holders.
//!
//! - [`schedule`]: per-token inflation rate and its annual decay
//! - [`weights`]: basis-point market weights per token
//! - [`index`]: cumulative indices and user snapshots
//! - [`ledger`]: owed balances and shortfall settlement
//! - [`scaling`]: early-withdrawal ramp and stake multiplier
//! - [`distributor`]: [`RewardDistributor`], which composes the above
//! - [`memory`]: in-memory position book and reserve
//! - [`config`]: file/environment configuration

pub mod config;
pub mod distributor;
pub mod index;
pub mod ledger;
pub mod memory;
pub mod scaling;
pub mod schedule;
pub mod weights;

pub use crate::config::{ConfigLoadError, DistributorConfig, ScalingKind};
pub use crate::distributor::{ClaimOutcome, MarketState, RewardDistributor};
pub use crate::memory::{MemoryReserve, PositionBook};
pub use crate::scaling::PositionScaling;
