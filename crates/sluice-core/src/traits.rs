//! Trait interfaces for the collaborators the distributor consumes.
//!
//! - [`PositionSource`]: position sizes reported by a market (perpetual
//!   liquidity pool or staking vault)
//! - [`FundingReserve`]: the custodian the distributor draws reward tokens from

use crate::error::ReserveError;
use crate::types::Address;

/// Read-only view of position sizes held in markets.
///
/// Implemented by whatever owns positions: an AMM's liquidity book or a
/// staking vault. The distributor never writes positions; it only records
/// the last size it accrued against.
pub trait PositionSource {
    /// Current position size of `user` in `market`.
    fn position_of(&self, market: &Address, user: &Address) -> u128;
}

/// Custodian of already-minted reward tokens.
///
/// The distributor is granted an allowance over the reserve's balance and
/// draws against it when users claim.
pub trait FundingReserve {
    /// Amount of `token` the reserve holds.
    fn balance(&self, token: &Address) -> u128;

    /// Amount of `token` the distributor may currently draw: the lesser of
    /// the reserve's balance and the distributor's allowance.
    fn available(&self, token: &Address) -> u128;

    /// Move `amount` of `token` from the reserve to `to`.
    fn transfer(&mut self, token: &Address, to: &Address, amount: u128) -> Result<(), ReserveError>;
}
