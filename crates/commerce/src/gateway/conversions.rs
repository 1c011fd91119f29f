//! Wire format normalization.
//!
//! Backends in the wild answer with a handful of shapes: a bare array, an
//! envelope keyed by `items`, `cart`, `wishlist` or `data` (possibly nested
//! once), and items that are raw identifiers, populated product objects, or
//! line objects referencing a product. Everything is reduced here to canonical
//! records before it reaches the synchronizer.

use core::num::NonZeroU32;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::warn;

use atelier_core::{CartLine, CurrencyCode, Price, ProductId, ProductSnapshot, WishlistItem};

use super::GatewayError;
use crate::collection::Collection;
use crate::entity::{Cart, Wishlist};

/// Envelope keys that may hold the item list, in lookup order.
const LIST_KEYS: [&str; 4] = ["items", "cart", "wishlist", "data"];

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireItem {
    Id(String),
    Object(Box<WireObject>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireObject {
    id: Option<String>,
    #[serde(rename = "_id")]
    object_id: Option<String>,
    product_id: Option<String>,
    product: Option<WireItem>,
    quantity: Option<i64>,
    size: Option<String>,
    color: Option<String>,
    #[serde(alias = "title")]
    name: Option<String>,
    #[serde(alias = "designer")]
    brand: Option<String>,
    #[serde(alias = "image")]
    image_url: Option<WireImage>,
    price: Option<WirePrice>,
    #[serde(alias = "currencyCode")]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireImage {
    Url(String),
    Object { url: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireAmount {
    Text(String),
    Number(Number),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePrice {
    Amount(WireAmount),
    #[serde(rename_all = "camelCase")]
    Money {
        amount: WireAmount,
        #[serde(alias = "currency")]
        currency_code: Option<String>,
    },
}

/// Request body of a cart add.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddCartLineBody<'a> {
    pub product_id: &'a ProductId,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<&'a ProductSnapshot>,
}

/// Request body of a wishlist add.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddWishlistItemBody<'a> {
    pub product_id: &'a ProductId,
}

/// Request body of a cart quantity update.
#[derive(Debug, Serialize)]
pub(super) struct SetQuantityBody<'a> {
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'a str>,
}

// =============================================================================
// Normalization
// =============================================================================

/// One item reduced to the fields both kinds care about.
#[derive(Debug)]
struct NormalizedItem {
    product_id: ProductId,
    quantity: i64,
    size: Option<String>,
    color: Option<String>,
    product: Option<ProductSnapshot>,
}

/// Parse a response body. An empty body is an empty collection.
pub(super) fn parse_body(text: &str) -> Result<Value, GatewayError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| GatewayError::Parse(e.to_string()))
}

/// Normalize a response into cart lines.
///
/// Lines with a non-positive quantity or an empty identifier are dropped;
/// duplicate composite keys keep their first occurrence.
pub(super) fn cart_lines(body: Value) -> Result<Vec<CartLine>, GatewayError> {
    let lines = normalize_items(body)?.into_iter().filter_map(|item| {
        let quantity = match u32::try_from(item.quantity) {
            Ok(n) => NonZeroU32::new(n)?,
            Err(_) if item.quantity > 0 => NonZeroU32::MAX,
            Err(_) => return None,
        };
        Some(CartLine {
            product_id: item.product_id,
            quantity,
            size: item.size,
            color: item.color,
            product: item.product,
        })
    });
    Ok(Collection::<Cart>::from_records(lines).into_records())
}

/// Normalize a response into wishlist items. Quantities are ignored.
pub(super) fn wishlist_items(body: Value) -> Result<Vec<WishlistItem>, GatewayError> {
    let items = normalize_items(body)?
        .into_iter()
        .map(|item| WishlistItem {
            product_id: item.product_id,
            product: item.product,
        });
    Ok(Collection::<Wishlist>::from_records(items).into_records())
}

fn normalize_items(body: Value) -> Result<Vec<NormalizedItem>, GatewayError> {
    Ok(extract_list(body)?
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<WireItem>(raw) {
            Ok(item) => normalize_item(item),
            Err(e) => {
                warn!(error = %e, "Dropping unrecognized item in response");
                None
            }
        })
        .collect())
}

/// Locate the item list inside a response.
fn extract_list(body: Value) -> Result<Vec<Value>, GatewayError> {
    match body {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(map) => find_list(map, true).ok_or_else(|| {
            GatewayError::Parse("response does not contain an item list".to_string())
        }),
        other => Err(GatewayError::Parse(format!(
            "unexpected response shape: {}",
            truncate(&other.to_string())
        ))),
    }
}

fn find_list(mut map: Map<String, Value>, descend: bool) -> Option<Vec<Value>> {
    for key in LIST_KEYS {
        match map.remove(key) {
            Some(Value::Array(items)) => return Some(items),
            Some(Value::Null) => return Some(Vec::new()),
            Some(Value::Object(inner)) if descend => {
                if let Some(items) = find_list(inner, false) {
                    return Some(items);
                }
            }
            _ => {}
        }
    }
    None
}

fn normalize_item(item: WireItem) -> Option<NormalizedItem> {
    let normalized = match item {
        WireItem::Id(id) => NormalizedItem {
            product_id: ProductId::new(id),
            quantity: 1,
            size: None,
            color: None,
            product: None,
        },
        WireItem::Object(object) => normalize_object(*object)?,
    };
    if normalized.product_id.is_empty() {
        return None;
    }
    Some(normalized)
}

fn normalize_object(object: WireObject) -> Option<NormalizedItem> {
    // A line object references its product; the line's own `id` is not it.
    let (product_id, nested) = match object.product {
        Some(WireItem::Id(id)) => (Some(id), None),
        Some(WireItem::Object(product)) => {
            let id = product
                .id
                .clone()
                .or_else(|| product.object_id.clone())
                .or_else(|| product.product_id.clone());
            (id, Some(*product))
        }
        None => (None, None),
    };
    let product_id = product_id
        .or(object.product_id)
        .or(object.id)
        .or(object.object_id)?;

    let top_level = WireObject {
        name: object.name,
        brand: object.brand,
        image_url: object.image_url,
        price: object.price,
        currency: object.currency,
        ..WireObject::default()
    };
    let product = nested
        .and_then(snapshot_of)
        .or_else(|| snapshot_of(top_level));

    Some(NormalizedItem {
        product_id: ProductId::new(product_id),
        quantity: object.quantity.unwrap_or(1),
        size: object.size.filter(|s| !s.is_empty()),
        color: object.color.filter(|c| !c.is_empty()),
        product,
    })
}

fn snapshot_of(object: WireObject) -> Option<ProductSnapshot> {
    let snapshot = ProductSnapshot {
        name: object.name,
        brand: object.brand,
        image_url: object.image_url.map(|image| match image {
            WireImage::Url(url) | WireImage::Object { url } => url,
        }),
        price: object
            .price
            .and_then(|price| convert_price(price, object.currency.as_deref())),
    };
    (!snapshot.is_empty()).then_some(snapshot)
}

fn convert_price(price: WirePrice, fallback_currency: Option<&str>) -> Option<Price> {
    let (amount, currency) = match price {
        WirePrice::Amount(amount) => (amount, fallback_currency.map(str::to_string)),
        WirePrice::Money {
            amount,
            currency_code,
        } => (amount, currency_code.or_else(|| fallback_currency.map(str::to_string))),
    };

    let currency_code = match currency.as_deref() {
        Some(code) => match CurrencyCode::from_str(code) {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "Dropping price with unsupported currency");
                return None;
            }
        },
        None => CurrencyCode::default(),
    };

    let text = match amount {
        WireAmount::Text(text) => text,
        WireAmount::Number(number) => number.to_string(),
    };
    let amount = Decimal::from_str(text.trim())
        .or_else(|_| Decimal::from_scientific(text.trim()))
        .ok()?;
    (!amount.is_sign_negative()).then(|| Price::new(amount, currency_code))
}

fn truncate(text: &str) -> String {
    text.chars().take(200).collect()
}
