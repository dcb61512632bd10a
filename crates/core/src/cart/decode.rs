//! Lenient decoding for line items arriving from loosely-typed sources.
//!
//! Line items come back from local storage and from the backend as JSON that
//! may have been written by older clients or edited by hand. Numeric fields
//! are coerced instead of rejected: anything that is not a usable number
//! becomes zero. Entries that cannot be identified (no product id, not an
//! object) are dropped.

use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

use super::LineItem;
use crate::types::ProductId;

/// Decode a JSON value into a list of line items.
///
/// Non-array input decodes as an empty list.
#[must_use]
pub fn decode_items(value: Value) -> Vec<LineItem> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<LineItem>(entry).ok())
        .collect()
}

/// Coerce an arbitrary JSON value into a quantity.
#[must_use]
pub fn coerce_quantity(value: Option<&Value>) -> u32 {
    let number = match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|q| u32::try_from(q).unwrap_or(u32::MAX))
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().map(float_to_quantity)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u32>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(float_to_quantity))
        }
        _ => None,
    };
    number.unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped before the cast
fn float_to_quantity(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.floor().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// Coerce an arbitrary JSON value into a monetary amount.
#[must_use]
pub fn coerce_price(value: Option<&Value>) -> Decimal {
    let amount = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_u64().map(Decimal::from))
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    amount.unwrap_or(Decimal::ZERO)
}

pub(crate) fn lenient_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(coerce_quantity(value.as_ref()))
}

pub(crate) fn lenient_price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(coerce_price(value.as_ref()))
}

pub(crate) fn lenient_product_id<'de, D>(deserializer: D) -> Result<ProductId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Ok(ProductId::new(s)),
        Value::Number(n) => Ok(ProductId::new(n.to_string())),
        other => Err(D::Error::custom(format!("invalid product id: {other}"))),
    }
}

/// A variant part (size or color). Blank strings and non-scalar values are
/// absent, matching `VariantKey::new`.
pub(crate) fn lenient_variant_part<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let part = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    Ok(part
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty()))
}

/// Serialize a decimal amount as a JSON number rather than a string.
pub(crate) fn price_as_number<S>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if amount.fract().is_zero()
        && let Some(whole) = amount.to_i64()
    {
        return serializer.serialize_i64(whole);
    }
    serializer.serialize_f64(amount.to_f64().unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_non_array_decodes_empty() {
        assert!(decode_items(json!(null)).is_empty());
        assert!(decode_items(json!({"items": []})).is_empty());
        assert!(decode_items(json!("p1")).is_empty());
    }

    #[test]
    fn test_decode_drops_unidentifiable_entries() {
        let items = decode_items(json!([
            {"productId": "p1", "quantity": 1, "unitPrice": 5},
            {"quantity": 3, "unitPrice": 5},
            42,
            {"productId": "", "quantity": 1}
        ]));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id.as_str(), "p1");
    }

    #[test]
    fn test_quantity_coercion() {
        assert_eq!(coerce_quantity(Some(&json!(4))), 4);
        assert_eq!(coerce_quantity(Some(&json!("7"))), 7);
        assert_eq!(coerce_quantity(Some(&json!(2.9))), 2);
        assert_eq!(coerce_quantity(Some(&json!(-3))), 0);
        assert_eq!(coerce_quantity(Some(&json!("lots"))), 0);
        assert_eq!(coerce_quantity(Some(&json!(true))), 0);
        assert_eq!(coerce_quantity(Some(&Value::Null)), 0);
        assert_eq!(coerce_quantity(None), 0);
    }

    #[test]
    fn test_price_coercion() {
        assert_eq!(coerce_price(Some(&json!(10))), Decimal::from(10));
        assert_eq!(coerce_price(Some(&json!(19.99))), Decimal::new(1999, 2));
        assert_eq!(coerce_price(Some(&json!(" 4.50 "))), Decimal::new(450, 2));
        assert_eq!(coerce_price(Some(&json!("free"))), Decimal::ZERO);
        assert_eq!(coerce_price(Some(&json!([1]))), Decimal::ZERO);
        assert_eq!(coerce_price(None), Decimal::ZERO);
    }

    #[test]
    fn test_numeric_product_id_is_accepted() {
        let items = decode_items(json!([{"id": 17, "quantity": 1, "unitPrice": 1}]));
        assert_eq!(items[0].product_id.as_str(), "17");
    }

    #[test]
    fn test_missing_numbers_default_to_zero() {
        let items = decode_items(json!([{"productId": "p1"}]));
        assert_eq!(items[0].quantity, 0);
        assert_eq!(items[0].unit_price, Decimal::ZERO);
    }
}
