//! Line items and variant keys.

use core::convert::Infallible;
use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::decode;
use crate::types::ProductId;

/// The selected variant of a product: size and color, each optional.
///
/// Two line items for the same product with different variant keys are
/// distinct lines. The textual form is `size/color` (e.g. `M/Red`); a
/// variant with no color renders as just the size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    /// Selected size, if the product has sizes.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "decode::lenient_variant_part"
    )]
    pub size: Option<String>,
    /// Selected color, if the product has colors.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "decode::lenient_variant_part"
    )]
    pub color: Option<String>,
}

impl VariantKey {
    /// Create a variant key, treating blank parts as absent.
    #[must_use]
    pub fn new(size: Option<&str>, color: Option<&str>) -> Self {
        Self {
            size: non_blank(size),
            color: non_blank(color),
        }
    }

    /// Whether neither size nor color is selected.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.size.is_none() && self.color.is_none()
    }
}

fn non_blank(part: Option<&str>) -> Option<String> {
    part.map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.size.as_deref().unwrap_or("");
        match &self.color {
            Some(color) => write!(f, "{size}/{color}"),
            None => f.write_str(size),
        }
    }
}

impl FromStr for VariantKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once('/') {
            Some((size, color)) => Self::new(Some(size), Some(color)),
            None => Self::new(Some(s), None),
        })
    }
}

/// One entry in the cart: a product variant and how many of it.
///
/// `unit_price`, `title` and `thumbnail` are captured when the item is added
/// and are never re-fetched, so the cart renders offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(alias = "id", deserialize_with = "decode::lenient_product_id")]
    pub product_id: ProductId,
    #[serde(flatten)]
    pub variant: VariantKey,
    #[serde(default, deserialize_with = "decode::lenient_quantity")]
    pub quantity: u32,
    #[serde(
        default,
        alias = "price",
        serialize_with = "decode::price_as_number",
        deserialize_with = "decode::lenient_price"
    )]
    pub unit_price: Decimal,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl LineItem {
    /// Create a line item with no display fields.
    #[must_use]
    pub fn new(
        product_id: impl Into<ProductId>,
        variant: VariantKey,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            variant,
            quantity,
            unit_price,
            title: String::new(),
            thumbnail: None,
        }
    }

    /// Set the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the display thumbnail URL.
    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Build a line item from a catalog listing.
    ///
    /// The requested quantity is clamped to `[1, stock]`. Returns `None` when
    /// the product is out of stock.
    #[must_use]
    pub fn from_listing(listing: &ProductListing, variant: VariantKey, requested: u32) -> Option<Self> {
        if listing.stock == 0 {
            return None;
        }

        Some(Self {
            product_id: listing.id.clone(),
            variant,
            quantity: requested.clamp(1, listing.stock),
            unit_price: listing.price,
            title: listing.title.clone(),
            thumbnail: listing.thumbnail.clone(),
        })
    }

    /// Whether this line is for the given product and variant.
    #[must_use]
    pub fn matches(&self, product_id: &ProductId, variant: &VariantKey) -> bool {
        &self.product_id == product_id && &self.variant == variant
    }

    /// Price of the whole line (`unit_price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Current price and availability of a product, as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListing {
    #[serde(deserialize_with = "decode::lenient_product_id")]
    pub id: ProductId,
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        serialize_with = "decode::price_as_number",
        deserialize_with = "decode::lenient_price"
    )]
    pub price: Decimal,
    #[serde(default, deserialize_with = "decode::lenient_quantity")]
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}
