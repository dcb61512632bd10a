//! Derived cart totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{LineItem, decode};

/// Item count and monetary total derived from a cart's lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    /// Sum of all line quantities.
    pub total_items: u64,
    /// Sum of `unit_price * quantity` over all lines.
    #[serde(
        serialize_with = "decode::price_as_number",
        deserialize_with = "decode::lenient_price"
    )]
    pub total_price: Decimal,
}

/// Compute totals for a sequence of line items.
///
/// Pure and infallible. Arithmetic saturates rather than overflowing.
#[must_use]
pub fn calculate_totals(items: &[LineItem]) -> CartTotals {
    items.iter().fold(CartTotals::default(), |acc, item| CartTotals {
        total_items: acc.total_items.saturating_add(u64::from(item.quantity)),
        total_price: acc.total_price.saturating_add(item.line_total()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::VariantKey;

    #[test]
    fn test_empty_totals() {
        assert_eq!(calculate_totals(&[]), CartTotals::default());
    }

    #[test]
    fn test_totals_sum_lines() {
        let items = vec![
            LineItem::new("p1", VariantKey::default(), 2, Decimal::from(10)),
            LineItem::new("p2", VariantKey::default(), 1, Decimal::new(499, 2)),
        ];
        let totals = calculate_totals(&items);
        assert_eq!(totals.total_items, 3);
        assert_eq!(totals.total_price, Decimal::new(2499, 2));
    }

    #[test]
    fn test_zeroed_fields_contribute_nothing() {
        let items = vec![
            LineItem::new("p1", VariantKey::default(), 0, Decimal::from(10)),
            LineItem::new("p2", VariantKey::default(), 4, Decimal::ZERO),
        ];
        let totals = calculate_totals(&items);
        assert_eq!(totals.total_items, 4);
        assert_eq!(totals.total_price, Decimal::ZERO);
    }

    #[test]
    fn test_huge_values_saturate() {
        let items = vec![
            LineItem::new("p1", VariantKey::default(), u32::MAX, Decimal::MAX),
            LineItem::new("p2", VariantKey::default(), u32::MAX, Decimal::MAX),
        ];
        let totals = calculate_totals(&items);
        assert_eq!(totals.total_items, u64::from(u32::MAX) * 2);
        assert_eq!(totals.total_price, Decimal::MAX);
    }
}
