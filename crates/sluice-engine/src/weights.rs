//! Per-token market weights in basis points.
//!
//! For every registered token the weights of its active markets sum to
//! exactly [`MAX_BASIS_POINTS`]. A market whose weight drops to zero leaves
//! the active set; its index history is kept elsewhere and untouched here.

use std::collections::{BTreeMap, BTreeSet};

use sluice_core::constants::MAX_BASIS_POINTS;
use sluice_core::error::RewardError;
use sluice_core::types::Address;

/// Validate a complete weight assignment for one token.
///
/// Checks, in order: equal lengths, no duplicate markets, no weight above
/// [`MAX_BASIS_POINTS`], and a total of exactly [`MAX_BASIS_POINTS`].
pub fn validate_weights(markets: &[Address], weights: &[u16]) -> Result<(), RewardError> {
    if markets.len() != weights.len() {
        return Err(RewardError::IncorrectWeightsCount {
            markets: markets.len(),
            weights: weights.len(),
        });
    }

    let mut seen = BTreeSet::new();
    for market in markets {
        if !seen.insert(*market) {
            return Err(RewardError::DuplicateMarket(*market));
        }
    }

    let mut sum: u32 = 0;
    for &weight in weights {
        if weight > MAX_BASIS_POINTS {
            return Err(RewardError::WeightExceedsMax {
                weight,
                max: MAX_BASIS_POINTS,
            });
        }
        sum += weight as u32;
    }

    if sum != MAX_BASIS_POINTS as u32 {
        return Err(RewardError::IncorrectWeightsSum {
            sum,
            expected: MAX_BASIS_POINTS,
        });
    }
    Ok(())
}

/// Result of replacing a token's weights.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightChange {
    /// Markets with a non-zero weight after the change.
    pub assigned: Vec<(Address, u16)>,
    /// Markets that were active before and are not any more.
    pub removed: Vec<Address>,
}

/// Weight assignments for all registered tokens.
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    weights: BTreeMap<Address, BTreeMap<Address, u16>>,
}

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight of `market` for `token`, zero if inactive.
    pub fn weight(&self, token: &Address, market: &Address) -> u16 {
        self.weights
            .get(token)
            .and_then(|m| m.get(market))
            .copied()
            .unwrap_or(0)
    }

    /// Markets currently earning `token`, in address order.
    pub fn active_markets(&self, token: &Address) -> Vec<Address> {
        self.weights
            .get(token)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Sum of `token`'s active weights.
    pub fn total(&self, token: &Address) -> u32 {
        self.weights
            .get(token)
            .map(|m| m.values().map(|&w| w as u32).sum())
            .unwrap_or(0)
    }

    /// Replace `token`'s active set with `markets`/`weights`.
    ///
    /// Validates first; on error the table is unchanged. Zero weights and
    /// previously active markets missing from `markets` are dropped.
    pub fn replace(
        &mut self,
        token: Address,
        markets: &[Address],
        weights: &[u16],
    ) -> Result<WeightChange, RewardError> {
        validate_weights(markets, weights)?;

        let previous = self.weights.remove(&token).unwrap_or_default();
        let next: BTreeMap<Address, u16> = markets
            .iter()
            .copied()
            .zip(weights.iter().copied())
            .filter(|&(_, w)| w > 0)
            .collect();

        let removed = previous
            .keys()
            .filter(|m| !next.contains_key(m))
            .copied()
            .collect();
        let assigned = next.iter().map(|(&m, &w)| (m, w)).collect();

        self.weights.insert(token, next);
        Ok(WeightChange { assigned, removed })
    }

    /// Drop every weight of `token`, returning the markets that were active.
    pub fn clear(&mut self, token: &Address) -> Vec<Address> {
        self.weights
            .remove(token)
            .map(|m| m.into_keys().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(seed: u8) -> Address {
        Address::repeat_byte(seed)
    }

    const TOKEN: Address = Address::repeat_byte(0xAA);

    #[test]
    fn validate_accepts_full_allocation() {
        assert!(validate_weights(&[addr(1), addr(2)], &[7_500, 2_500]).is_ok());
    }

    #[test]
    fn validate_count_mismatch() {
        assert_eq!(
            validate_weights(&[addr(1), addr(2)], &[10_000]).unwrap_err(),
            RewardError::IncorrectWeightsCount { markets: 2, weights: 1 }
        );
    }

    #[test]
    fn validate_weight_above_max() {
        assert_eq!(
            validate_weights(&[addr(1), addr(2)], &[10_001, 0]).unwrap_err(),
            RewardError::WeightExceedsMax { weight: 10_001, max: 10_000 }
        );
    }

    #[test]
    fn validate_sum_too_low() {
        assert_eq!(
            validate_weights(&[addr(1), addr(2)], &[5_000, 4_999]).unwrap_err(),
            RewardError::IncorrectWeightsSum { sum: 9_999, expected: 10_000 }
        );
    }

    #[test]
    fn validate_sum_too_high() {
        assert_eq!(
            validate_weights(&[addr(1), addr(2)], &[10_000, 1]).unwrap_err(),
            RewardError::IncorrectWeightsSum { sum: 10_001, expected: 10_000 }
        );
    }

    #[test]
    fn validate_empty_is_wrong_sum() {
        assert_eq!(
            validate_weights(&[], &[]).unwrap_err(),
            RewardError::IncorrectWeightsSum { sum: 0, expected: 10_000 }
        );
    }

    #[test]
    fn validate_duplicate_market() {
        assert_eq!(
            validate_weights(&[addr(1), addr(1)], &[5_000, 5_000]).unwrap_err(),
            RewardError::DuplicateMarket(addr(1))
        );
    }

    #[test]
    fn replace_sets_weights() {
        let mut table = WeightTable::new();
        let change = table.replace(TOKEN, &[addr(1), addr(2)], &[7_500, 2_500]).unwrap();
        assert_eq!(change.assigned, vec![(addr(1), 7_500), (addr(2), 2_500)]);
        assert!(change.removed.is_empty());
        assert_eq!(table.weight(&TOKEN, &addr(1)), 7_500);
        assert_eq!(table.total(&TOKEN), 10_000);
    }

    #[test]
    fn zero_weight_removes_market() {
        let mut table = WeightTable::new();
        table.replace(TOKEN, &[addr(1), addr(2)], &[7_500, 2_500]).unwrap();
        let change = table.replace(TOKEN, &[addr(1), addr(2)], &[10_000, 0]).unwrap();
        assert_eq!(change.removed, vec![addr(2)]);
        assert_eq!(table.active_markets(&TOKEN), vec![addr(1)]);
        assert_eq!(table.weight(&TOKEN, &addr(2)), 0);
    }

    #[test]
    fn omitted_market_is_removed() {
        let mut table = WeightTable::new();
        table.replace(TOKEN, &[addr(1), addr(2)], &[5_000, 5_000]).unwrap();
        let change = table.replace(TOKEN, &[addr(3)], &[10_000]).unwrap();
        assert_eq!(change.removed, vec![addr(1), addr(2)]);
        assert_eq!(table.active_markets(&TOKEN), vec![addr(3)]);
    }

    #[test]
    fn invalid_replace_keeps_previous() {
        let mut table = WeightTable::new();
        table.replace(TOKEN, &[addr(1)], &[10_000]).unwrap();
        assert!(table.replace(TOKEN, &[addr(2)], &[9_000]).is_err());
        assert_eq!(table.weight(&TOKEN, &addr(1)), 10_000);
    }

    #[test]
    fn clear_returns_active_markets() {
        let mut table = WeightTable::new();
        table.replace(TOKEN, &[addr(1), addr(2)], &[5_000, 5_000]).unwrap();
        assert_eq!(table.clear(&TOKEN), vec![addr(1), addr(2)]);
        assert_eq!(table.total(&TOKEN), 0);
        assert!(table.clear(&TOKEN).is_empty());
    }

    #[test]
    fn tokens_are_independent() {
        let other = Address::repeat_byte(0xBB);
        let mut table = WeightTable::new();
        table.replace(TOKEN, &[addr(1)], &[10_000]).unwrap();
        table.replace(other, &[addr(1), addr(2)], &[2_000, 8_000]).unwrap();
        assert_eq!(table.weight(&TOKEN, &addr(1)), 10_000);
        assert_eq!(table.weight(&other, &addr(1)), 2_000);
    }
}
