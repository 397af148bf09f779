//! Investment fund distribution
//!
//! Investment orders are funded once, when ordering starts, from the shared
//! investment fund `F`:
//!
//! 1. Orders whose producer has a cut-off price get `floor(price × F / Σ prices)`
//! 2. What is left is split evenly (floored) across orders without a price
//!
//! If every known price is 0 the prices carry no signal and all orders are
//! treated as unpriced. Rounding dust is not handed out; it stays in the
//! fund for the next cycle.

use crate::core::types::{OrderId, Tokens, UnitPrice};
use std::collections::BTreeMap;

/// Compute each order's share of `fund`
///
/// Returns an allocation for every claim. The allocations never sum to more
/// than `fund`.
///
/// # Example
/// ```
/// use tokenomics_emulator_core_rs::core::types::OrderId;
/// use tokenomics_emulator_core_rs::orchestrator::funding::distribute;
///
/// let (a, b) = (OrderId::new("a"), OrderId::new("b"));
/// let shares = distribute(90, &[(a.clone(), Some(2.0)), (b.clone(), Some(1.0))]);
/// assert_eq!(shares[&a], 60);
/// assert_eq!(shares[&b], 30);
/// ```
pub fn distribute(fund: Tokens, claims: &[(OrderId, Option<UnitPrice>)]) -> BTreeMap<OrderId, Tokens> {
    let total: UnitPrice = claims.iter().filter_map(|(_, p)| *p).sum();
    let priced = total > 0.0;

    let mut shares = BTreeMap::new();
    let mut distributed: Tokens = 0;
    let mut unpriced = Vec::new();

    for (order_id, price) in claims {
        match price {
            Some(price) if priced => {
                let share = (price * fund as f64 / total).floor() as Tokens;
                let share = share.min(fund - distributed);
                distributed += share;
                shares.insert(order_id.clone(), share);
            }
            _ => unpriced.push(order_id),
        }
    }

    if !unpriced.is_empty() {
        let share = (fund - distributed) / unpriced.len() as Tokens;
        for order_id in unpriced {
            shares.insert(order_id.clone(), share);
        }
    }

    shares
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> OrderId {
        OrderId::new(s)
    }

    #[test]
    fn test_proportional_to_cut_off_price() {
        let shares = distribute(90, &[(id("a"), Some(2.0)), (id("b"), Some(1.0))]);
        assert_eq!(shares[&id("a")], 60);
        assert_eq!(shares[&id("b")], 30);
    }

    #[test]
    fn test_unpriced_orders_split_the_rest() {
        let shares = distribute(
            100,
            &[(id("a"), Some(1.0)), (id("b"), None), (id("c"), Some(1.0)), (id("d"), None)],
        );
        assert_eq!(shares[&id("a")], 50);
        assert_eq!(shares[&id("c")], 50);
        assert_eq!(shares[&id("b")], 0);
        assert_eq!(shares[&id("d")], 0);
    }

    #[test]
    fn test_all_unpriced_split_evenly_with_dust() {
        let shares = distribute(10, &[(id("a"), None), (id("b"), None), (id("c"), None)]);
        assert!(shares.values().all(|s| *s == 3));
        assert_eq!(shares.values().sum::<Tokens>(), 9);
    }

    #[test]
    fn test_zero_prices_are_treated_as_unpriced() {
        let shares = distribute(10, &[(id("a"), Some(0.0)), (id("b"), None)]);
        assert_eq!(shares[&id("a")], 5);
        assert_eq!(shares[&id("b")], 5);
    }

    #[test]
    fn test_rounding_never_exceeds_fund() {
        let shares = distribute(
            7,
            &[(id("a"), Some(1.0 / 3.0)), (id("b"), Some(1.0 / 3.0)), (id("c"), Some(1.0 / 3.0))],
        );
        assert!(shares.values().sum::<Tokens>() <= 7);
    }

    #[test]
    fn test_no_claims() {
        assert!(distribute(50, &[]).is_empty());
    }
}
