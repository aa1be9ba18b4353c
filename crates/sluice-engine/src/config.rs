//! Distributor configuration.
//!
//! Loaded from an optional TOML/JSON file layered under `SLUICE_*`
//! environment variables. Values are in human units and converted to WAD
//! when the scaling variant is built.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sluice_core::constants::{
    DEFAULT_EARLY_WITHDRAWAL_THRESHOLD, DEFAULT_MAX_REWARD_MULTIPLIER, DEFAULT_SMOOTHING_VALUE,
    MAX_BASIS_POINTS, WAD,
};
use sluice_core::error::{MathError, RewardError};
use sluice_core::traits::{FundingReserve, PositionSource};

use crate::distributor::RewardDistributor;
use crate::scaling::PositionScaling;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file {} not found", .0.display())] NotFound(PathBuf),
    #[error("failed to read configuration: {0}")] Read(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")] Invalid(#[from] RewardError),
}

/// Which scaling rule a distributor applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingKind {
    #[default]
    EarlyWithdrawal,
    StakeMultiplier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    pub variant: ScalingKind,
    /// Ramp length in seconds.
    pub early_withdrawal_threshold: u64,
    /// Multiplier ceiling in basis points (40_000 = 4x).
    pub max_reward_multiplier_bps: u64,
    /// Smoothing value of the multiplier curve, in days.
    pub smoothing_value: u64,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            variant: ScalingKind::EarlyWithdrawal,
            early_withdrawal_threshold: DEFAULT_EARLY_WITHDRAWAL_THRESHOLD,
            max_reward_multiplier_bps: (DEFAULT_MAX_REWARD_MULTIPLIER * MAX_BASIS_POINTS as u128 / WAD) as u64,
            smoothing_value: (DEFAULT_SMOOTHING_VALUE / WAD) as u64,
        }
    }
}

impl DistributorConfig {
    /// Load from `path` (if given) and the environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        Self::load_layered(path, None)
    }

    /// Like [`load`](Self::load), reading `SLUICE_*` variables from `env`
    /// instead of the process environment when given.
    fn load_layered(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self, ConfigLoadError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigLoadError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("SLUICE").try_parsing(true).source(env));

        let loaded: Self = builder.build()?.try_deserialize()?;
        loaded.scaling()?;
        Ok(loaded)
    }

    /// Max multiplier as WAD.
    pub fn max_reward_multiplier(&self) -> Result<u128, RewardError> {
        (self.max_reward_multiplier_bps as u128)
            .checked_mul(WAD)
            .map(|v| v / MAX_BASIS_POINTS as u128)
            .ok_or(RewardError::Math(MathError::Overflow))
    }

    /// Smoothing value as WAD.
    pub fn smoothing_value_wad(&self) -> Result<u128, RewardError> {
        (self.smoothing_value as u128)
            .checked_mul(WAD)
            .ok_or(RewardError::Math(MathError::Overflow))
    }

    /// Build the configured scaling variant, applying the same bounds as the
    /// admin setters.
    pub fn scaling(&self) -> Result<PositionScaling, RewardError> {
        match self.variant {
            ScalingKind::EarlyWithdrawal => PositionScaling::early_withdrawal(self.early_withdrawal_threshold),
            ScalingKind::StakeMultiplier => {
                PositionScaling::stake_multiplier(self.max_reward_multiplier()?, self.smoothing_value_wad()?)
            }
        }
    }

    /// Create a distributor over `positions` and `reserve`.
    pub fn build<P, R>(&self, positions: P, reserve: R) -> Result<RewardDistributor<P, R>, RewardError>
    where
        P: PositionSource,
        R: FundingReserve,
    {
        Ok(RewardDistributor::new(positions, reserve, self.scaling()?))
    }
}
