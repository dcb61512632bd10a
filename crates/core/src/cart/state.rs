//! Cart state and its transitions.
//!
//! `CartState` holds the ordered line items and the totals derived from
//! them. Every transition recomputes the totals, so they always equal a
//! fresh [`calculate_totals`] over the current items.

use rust_decimal::Decimal;
use serde::Serialize;

use super::{CartTotals, LineItem, VariantKey, calculate_totals};
use crate::types::ProductId;

/// The current cart: line items in display order plus derived totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    items: Vec<LineItem>,
    #[serde(flatten)]
    totals: CartTotals,
}

/// Result of [`CartState::update_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityUpdate {
    /// The line's quantity was changed.
    Updated,
    /// The new quantity was below one, so the line was removed.
    Removed,
    /// The line already had the requested quantity.
    Unchanged,
    /// No line matched the product and variant.
    Missing,
}

impl QuantityUpdate {
    /// Whether the cart contents changed.
    #[must_use]
    pub const fn changed(self) -> bool {
        matches!(self, Self::Updated | Self::Removed)
    }
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from externally sourced items.
    ///
    /// Lines with zero quantity are dropped and duplicate
    /// (`product_id`, `variant`) pairs are folded into the first occurrence.
    #[must_use]
    pub fn from_items(items: Vec<LineItem>) -> Self {
        let mut state = Self::new();
        state.replace(items);
        state
    }

    /// Line items in display order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Derived totals.
    #[must_use]
    pub const fn totals(&self) -> CartTotals {
        self.totals
    }

    /// Sum of all quantities.
    #[must_use]
    pub const fn total_items(&self) -> u64 {
        self.totals.total_items
    }

    /// Sum of all line totals.
    #[must_use]
    pub const fn total_price(&self) -> Decimal {
        self.totals.total_price
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Find the line for a product variant.
    #[must_use]
    pub fn find(&self, product_id: &ProductId, variant: &VariantKey) -> Option<&LineItem> {
        self.items.iter().find(|i| i.matches(product_id, variant))
    }

    /// Consume the state and return its items.
    #[must_use]
    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }

    /// Replace the whole cart.
    pub fn replace(&mut self, items: Vec<LineItem>) {
        self.items.clear();
        for item in items {
            if item.quantity > 0 {
                self.merge_line(item);
            }
        }
        self.recompute();
    }

    /// Add an item, merging into an existing line for the same variant.
    ///
    /// Returns `false` (and leaves the cart untouched) for a zero quantity.
    pub fn add_item(&mut self, item: LineItem) -> bool {
        if item.quantity == 0 {
            return false;
        }
        self.merge_line(item);
        self.recompute();
        true
    }

    /// Remove lines for a product.
    ///
    /// With a variant, only that line is removed. Without one, every variant
    /// of the product is removed. Returns whether anything was removed.
    pub fn remove_item(&mut self, product_id: &ProductId, variant: Option<&VariantKey>) -> bool {
        let before = self.items.len();
        self.items.retain(|item| match variant {
            Some(variant) => !item.matches(product_id, variant),
            None => &item.product_id != product_id,
        });

        let removed = self.items.len() != before;
        if removed {
            self.recompute();
        }
        removed
    }

    /// Set the quantity of one line. Quantities below one remove the line.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        variant: &VariantKey,
        quantity: i64,
    ) -> QuantityUpdate {
        let Some(position) = self
            .items
            .iter()
            .position(|i| i.matches(product_id, variant))
        else {
            return QuantityUpdate::Missing;
        };

        if quantity < 1 {
            self.items.remove(position);
            self.recompute();
            return QuantityUpdate::Removed;
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let Some(line) = self.items.get_mut(position) else {
            return QuantityUpdate::Missing;
        };
        if line.quantity == quantity {
            return QuantityUpdate::Unchanged;
        }
        line.quantity = quantity;
        self.recompute();
        QuantityUpdate::Updated
    }

    /// Remove every line. Returns whether the cart had any lines.
    pub fn clear(&mut self) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.items.clear();
        self.recompute();
        true
    }

    fn merge_line(&mut self, item: LineItem) {
        match self
            .items
            .iter_mut()
            .find(|i| i.matches(&item.product_id, &item.variant))
        {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
            None => self.items.push(item),
        }
    }

    fn recompute(&mut self) {
        self.totals = calculate_totals(&self.items);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(product: &str, variant: &str, quantity: u32, price: i64) -> LineItem {
        LineItem::new(product, variant.parse().unwrap(), quantity, Decimal::from(price))
    }

    fn assert_totals_consistent(state: &CartState) {
        assert_eq!(state.totals(), calculate_totals(state.items()));
    }

    #[test]
    fn test_guest_add() {
        let mut cart = CartState::new();
        assert!(cart.add_item(item("p1", "M/Red", 2, 10)));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.total_items(), 2);
        assert_eq!(cart.total_price(), Decimal::from(20));
    }

    #[test]
    fn test_same_variant_merges() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 2, 10));
        cart.add_item(item("p1", "M/Red", 3, 10));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
        assert_totals_consistent(&cart);
    }

    #[test]
    fn test_different_variants_are_distinct() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 1, 10));
        cart.add_item(item("p1", "L/Red", 1, 10));

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_add_zero_quantity_is_noop() {
        let mut cart = CartState::new();
        assert!(!cart.add_item(item("p1", "M/Red", 0, 10)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_insertion_order_is_display_order() {
        let mut cart = CartState::new();
        cart.add_item(item("b", "", 1, 1));
        cart.add_item(item("a", "", 1, 1));
        cart.add_item(item("b", "", 1, 1));

        let ids: Vec<&str> = cart.items().iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_update_to_zero_removes_line() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 2, 10));

        let outcome = cart.update_quantity(&"p1".into(), &"M/Red".parse().unwrap(), 0);
        assert_eq!(outcome, QuantityUpdate::Removed);
        assert!(cart.is_empty());
        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_update_negative_removes_line() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 2, 10));

        let outcome = cart.update_quantity(&"p1".into(), &"M/Red".parse().unwrap(), -4);
        assert_eq!(outcome, QuantityUpdate::Removed);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_sets_quantity() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 2, 10));

        let variant = "M/Red".parse().unwrap();
        assert_eq!(
            cart.update_quantity(&"p1".into(), &variant, 7),
            QuantityUpdate::Updated
        );
        assert_eq!(
            cart.update_quantity(&"p1".into(), &variant, 7),
            QuantityUpdate::Unchanged
        );
        assert_eq!(cart.total_items(), 7);
        assert_eq!(cart.total_price(), Decimal::from(70));
    }

    #[test]
    fn test_update_missing_line() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 2, 10));
        let before = cart.clone();

        let outcome = cart.update_quantity(&"p1".into(), &"S/Red".parse().unwrap(), 3);
        assert_eq!(outcome, QuantityUpdate::Missing);
        assert!(!outcome.changed());
        assert_eq!(cart, before);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 2, 10));

        assert!(!cart.remove_item(&"absent".into(), None));
        let once = cart.clone();
        assert!(!cart.remove_item(&"absent".into(), None));
        assert_eq!(cart, once);
    }

    #[test]
    fn test_remove_without_variant_removes_all_variants() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 1, 10));
        cart.add_item(item("p1", "L/Blue", 1, 10));
        cart.add_item(item("p2", "M/Red", 1, 5));

        assert!(cart.remove_item(&"p1".into(), None));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].product_id.as_str(), "p2");
        assert_totals_consistent(&cart);
    }

    #[test]
    fn test_remove_with_variant_keeps_others() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 1, 10));
        cart.add_item(item("p1", "L/Blue", 1, 10));

        assert!(cart.remove_item(&"p1".into(), Some(&"M/Red".parse().unwrap())));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].variant.to_string(), "L/Blue");
    }

    #[test]
    fn test_from_items_normalizes() {
        let cart = CartState::from_items(vec![
            item("p1", "M/Red", 1, 10),
            item("p2", "", 0, 10),
            item("p1", "M/Red", 2, 10),
        ]);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_totals_consistent(&cart);
    }

    #[test]
    fn test_clear() {
        let mut cart = CartState::new();
        assert!(!cart.clear());
        cart.add_item(item("p1", "M/Red", 1, 10));
        assert!(cart.clear());
        assert!(cart.is_empty());
        assert_eq!(cart.totals(), CartTotals::default());
    }

    #[test]
    fn test_serializes_with_totals() {
        let mut cart = CartState::new();
        cart.add_item(item("p1", "M/Red", 2, 10));
        let value = serde_json::to_value(&cart).unwrap();

        assert_eq!(value["totalItems"], 2);
        assert!(value["items"].is_array());
    }

    #[test]
    fn test_totals_invariant_over_operation_sequence() {
        let mut cart = CartState::new();
        let red: VariantKey = "M/Red".parse().unwrap();
        let blue: VariantKey = "M/Blue".parse().unwrap();

        cart.add_item(item("p1", "M/Red", 2, 10));
        assert_totals_consistent(&cart);
        cart.add_item(item("p2", "M/Blue", 1, 3));
        assert_totals_consistent(&cart);
        cart.update_quantity(&"p1".into(), &red, 9);
        assert_totals_consistent(&cart);
        cart.update_quantity(&"p2".into(), &blue, 0);
        assert_totals_consistent(&cart);
        cart.remove_item(&"p1".into(), None);
        assert_totals_consistent(&cart);
        cart.replace(vec![item("p3", "", 4, 2)]);
        assert_totals_consistent(&cart);
    }
}
