//! In-memory collaborators for tests and the simulator.

use std::collections::{HashMap, HashSet};

use sluice_core::error::ReserveError;
use sluice_core::traits::{FundingReserve, PositionSource};
use sluice_core::types::Address;

/// Position sizes keyed by (market, user).
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: HashMap<(Address, Address), u128>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `user`'s position in `market` to `size`.
    pub fn set(&mut self, market: Address, user: Address, size: u128) {
        if size == 0 {
            self.positions.remove(&(market, user));
        } else {
            self.positions.insert((market, user), size);
        }
    }
}

impl PositionSource for PositionBook {
    fn position_of(&self, market: &Address, user: &Address) -> u128 {
        self.positions.get(&(*market, *user)).copied().unwrap_or(0)
    }
}

/// Token balances held for the distributor, with an optional allowance cap.
#[derive(Debug, Clone, Default)]
pub struct MemoryReserve {
    balances: HashMap<Address, u128>,
    allowances: HashMap<Address, u128>,
    received: HashMap<(Address, Address), u128>,
    frozen: HashSet<Address>,
}

impl MemoryReserve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` of `token` to the reserve.
    pub fn fund(&mut self, token: Address, amount: u128) {
        let balance = self.balances.entry(token).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Cap what the distributor may draw of `token`. Without a cap the whole
    /// balance is available.
    pub fn set_allowance(&mut self, token: Address, amount: u128) {
        self.allowances.insert(token, amount);
    }

    /// Reject every transfer of `token` while frozen.
    pub fn set_frozen(&mut self, token: Address, frozen: bool) {
        if frozen {
            self.frozen.insert(token);
        } else {
            self.frozen.remove(&token);
        }
    }

    /// Total of `token` transferred out to `to`.
    pub fn received(&self, token: &Address, to: &Address) -> u128 {
        self.received.get(&(*token, *to)).copied().unwrap_or(0)
    }
}

impl FundingReserve for MemoryReserve {
    fn balance(&self, token: &Address) -> u128 {
        self.balances.get(token).copied().unwrap_or(0)
    }

    fn available(&self, token: &Address) -> u128 {
        let balance = self.balance(token);
        match self.allowances.get(token) {
            Some(&allowance) => balance.min(allowance),
            None => balance,
        }
    }

    fn transfer(&mut self, token: &Address, to: &Address, amount: u128) -> Result<(), ReserveError> {
        if self.frozen.contains(token) {
            return Err(ReserveError::Rejected {
                token: *token,
                reason: "reserve is frozen".to_string(),
            });
        }
        let available = self.available(token);
        if amount > available {
            return Err(ReserveError::InsufficientFunds {
                token: *token,
                available,
                requested: amount,
            });
        }

        if let Some(balance) = self.balances.get_mut(token) {
            *balance -= amount;
        }
        if let Some(allowance) = self.allowances.get_mut(token) {
            *allowance -= amount;
        }
        let received = self.received.entry((*token, *to)).or_default();
        *received = received.saturating_add(amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::repeat_byte(0xAA);
    const OTHER: Address = Address::repeat_byte(0xBB);
    const MARKET: Address = Address::repeat_byte(0x01);
    const ALICE: Address = Address::repeat_byte(0x0A);
    const BOB: Address = Address::repeat_byte(0x0B);

    #[test]
    fn book_overwrites_positions() {
        let mut book = PositionBook::new();
        book.set(MARKET, ALICE, 100);
        book.set(MARKET, BOB, 50);
        book.set(MARKET, ALICE, 30);
        assert_eq!(book.position_of(&MARKET, &ALICE), 30);
        book.set(MARKET, BOB, 0);
        assert_eq!(book.position_of(&MARKET, &BOB), 0);
        assert_eq!(book.position_of(&Address::repeat_byte(0x02), &ALICE), 0);
    }

    #[test]
    fn reserve_transfers_up_to_balance() {
        let mut reserve = MemoryReserve::new();
        reserve.fund(TOKEN, 100);
        reserve.transfer(&TOKEN, &ALICE, 60).unwrap();
        assert_eq!(reserve.balance(&TOKEN), 40);
        assert_eq!(reserve.received(&TOKEN, &ALICE), 60);
        assert!(matches!(
            reserve.transfer(&TOKEN, &ALICE, 41),
            Err(ReserveError::InsufficientFunds { available: 40, requested: 41, .. })
        ));
    }

    #[test]
    fn allowance_caps_availability() {
        let mut reserve = MemoryReserve::new();
        reserve.fund(TOKEN, 100);
        reserve.set_allowance(TOKEN, 30);
        assert_eq!(reserve.available(&TOKEN), 30);
        reserve.transfer(&TOKEN, &ALICE, 30).unwrap();
        assert_eq!(reserve.available(&TOKEN), 0);
        assert_eq!(reserve.balance(&TOKEN), 70);
    }

    #[test]
    fn frozen_token_rejects_transfers() {
        let mut reserve = MemoryReserve::new();
        reserve.fund(TOKEN, 100);
        reserve.fund(OTHER, 100);
        reserve.set_frozen(TOKEN, true);
        assert!(matches!(
            reserve.transfer(&TOKEN, &ALICE, 1),
            Err(ReserveError::Rejected { .. })
        ));
        assert_eq!(reserve.balance(&TOKEN), 100);
        reserve.transfer(&OTHER, &ALICE, 1).unwrap();

        reserve.set_frozen(TOKEN, false);
        reserve.transfer(&TOKEN, &ALICE, 1).unwrap();
        assert_eq!(reserve.balance(&TOKEN), 99);
    }
}
