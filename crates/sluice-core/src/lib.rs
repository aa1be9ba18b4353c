//! # sluice-core — Shared types for the Sluice reward engine.
//!
//! All amounts are integers. Rates, factors and indices are WAD fixed-point
//! (10^18 = 1.0) and times are Unix seconds.
//!
//! - [`constants`]: scales, bounds and defaults
//! - [`fixed`]: WAD multiply/divide and decay exponentiation
//! - [`error`]: the rejected-call taxonomy
//! - [`types`]: [`Address`](types::Address) and the [`RewardEvent`](types::RewardEvent) journal
//! - [`traits`]: the position and reserve collaborators

pub mod constants;
pub mod error;
pub mod fixed;
pub mod traits;
pub mod types;

pub use primitive_types::U256;
