//! Owed-but-unclaimed balances.
//!
//! `owed(user, token)` grows with every accrual and shrinks only when a
//! claim pays out. `total_unclaimed(token)` is the sum over all users and is
//! what a token removal must leave in the reserve.

use std::collections::{BTreeMap, HashMap};

use sluice_core::error::MathError;
use sluice_core::types::Address;

/// Result of settling one user's balance against the reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Amount to transfer now.
    pub paid: u128,
    /// Amount left owed because the reserve could not cover it.
    pub shortfall: u128,
}

#[derive(Debug, Clone, Default)]
pub struct ClaimLedger {
    accrued: HashMap<(Address, Address), u128>,
    unclaimed: HashMap<Address, u128>,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount of `token` owed to `user`.
    pub fn owed(&self, user: &Address, token: &Address) -> u128 {
        self.accrued.get(&(*user, *token)).copied().unwrap_or(0)
    }

    /// Amount of `token` owed across all users.
    pub fn total_unclaimed(&self, token: &Address) -> u128 {
        self.unclaimed.get(token).copied().unwrap_or(0)
    }

    /// Check that crediting `credits` to `user` cannot overflow.
    ///
    /// Several credits for the same token are summed first.
    pub fn check_credits<I>(&self, user: &Address, credits: I) -> Result<(), MathError>
    where
        I: IntoIterator<Item = (Address, u128)>,
    {
        let mut per_token: BTreeMap<Address, u128> = BTreeMap::new();
        for (token, amount) in credits {
            let entry = per_token.entry(token).or_default();
            *entry = entry.checked_add(amount).ok_or(MathError::Overflow)?;
        }
        for (token, amount) in per_token {
            self.owed(user, &token)
                .checked_add(amount)
                .ok_or(MathError::Overflow)?;
            self.total_unclaimed(&token)
                .checked_add(amount)
                .ok_or(MathError::Overflow)?;
        }
        Ok(())
    }

    /// Add `amount` of `token` to `user`'s balance.
    ///
    /// Callers run [`check_credits`](Self::check_credits) first; past that
    /// point the sums saturate rather than fail.
    pub fn credit(&mut self, user: Address, token: Address, amount: u128) {
        if amount == 0 {
            return;
        }
        let owed = self.accrued.entry((user, token)).or_default();
        *owed = owed.saturating_add(amount);
        let total = self.unclaimed.entry(token).or_default();
        *total = total.saturating_add(amount);
    }

    /// Remove `amount` of `token` from `user`'s balance.
    pub fn debit(&mut self, user: Address, token: Address, amount: u128) {
        if amount == 0 {
            return;
        }
        if let Some(owed) = self.accrued.get_mut(&(user, token)) {
            *owed = owed.saturating_sub(amount);
            if *owed == 0 {
                self.accrued.remove(&(user, token));
            }
        }
        if let Some(total) = self.unclaimed.get_mut(&token) {
            *total = total.saturating_sub(amount);
        }
    }

    /// Pay as much of `user`'s `token` balance as `available` covers.
    ///
    /// The paid part is debited immediately; the shortfall stays owed.
    pub fn settle(&mut self, user: Address, token: Address, available: u128) -> Settlement {
        let owed = self.owed(&user, &token);
        let paid = owed.min(available);
        self.debit(user, token, paid);
        Settlement {
            paid,
            shortfall: owed - paid,
        }
    }
}
