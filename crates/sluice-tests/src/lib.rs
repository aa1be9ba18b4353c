//! Scenario and invariant test suite for the Sluice reward engine.
//!
//! Integration tests drive a full [`RewardDistributor`](sluice_engine::RewardDistributor)
//! through the in-memory collaborators and check accounting end to end.

pub mod helpers;
