//! Cart domain: line items, derived totals and state transitions.
//!
//! Everything here is pure. Persistence and remote sync live in
//! `cartsync-client`.

mod decode;
mod line_item;
mod state;
mod totals;

pub use decode::{coerce_price, coerce_quantity, decode_items};
pub use line_item::{LineItem, ProductListing, VariantKey};
pub use state::{CartState, QuantityUpdate};
pub use totals::{CartTotals, calculate_totals};
