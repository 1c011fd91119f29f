//! Cart commands.

use core::num::NonZeroU32;
use core::str::FromStr;

use atelier_commerce::{CartAttributes, CartSynchronizer, SyncError};
use atelier_core::{CartLineKey, CurrencyCode, Price, ProductId, ProductSnapshot};

use super::CliError;

/// Validate a product identifier argument.
pub fn product_id(id: &str) -> Result<ProductId, CliError> {
    let id = ProductId::new(id.trim());
    if id.is_empty() {
        return Err(CliError::EmptyProductId);
    }
    Ok(id)
}

/// Build cart add input from command-line arguments.
pub fn attributes(
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
    name: Option<String>,
    price: Option<&str>,
    currency: &str,
) -> Result<CartAttributes, CliError> {
    let quantity = NonZeroU32::new(quantity).ok_or(CliError::ZeroQuantity)?;
    let price = price
        .map(|amount| Price::parse(amount, CurrencyCode::from_str(currency)?))
        .transpose()?;
    let product = ProductSnapshot {
        name,
        price,
        ..ProductSnapshot::default()
    };

    Ok(CartAttributes {
        quantity,
        size: non_empty(size),
        color: non_empty(color),
        product: (!product.is_empty()).then_some(product),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn line_key(id: &str, size: Option<String>, color: Option<String>) -> Result<CartLineKey, CliError> {
    Ok(CartLineKey::new(product_id(id)?, non_empty(size), non_empty(color)))
}

pub fn list(cart: &CartSynchronizer) {
    let snapshot = cart.snapshot();
    if snapshot.items.is_empty() {
        tracing::info!(availability = %snapshot.availability, "Cart is empty");
        return;
    }

    for line in snapshot.items.iter() {
        let name = line
            .product
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .unwrap_or("-");
        let price = line
            .product
            .as_ref()
            .and_then(|p| p.price)
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        tracing::info!("{} x{} {name} {price}", line.key(), line.quantity);
    }
    total(cart);
}

pub async fn add(
    cart: &CartSynchronizer,
    id: &str,
    attributes: CartAttributes,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = product_id(id)?;
    cart.add(id.clone(), attributes).await?;
    tracing::info!(product_id = %id, quantity = cart.quantity_of(&id), "Added to cart");
    Ok(())
}

pub async fn remove(
    cart: &CartSynchronizer,
    id: &str,
    size: Option<String>,
    color: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = line_key(id, size, color)?;
    cart.remove(key.clone()).await?;
    tracing::info!(line = %key, "Removed from cart");
    Ok(())
}

pub async fn set_quantity(
    cart: &CartSynchronizer,
    id: &str,
    quantity: i64,
    size: Option<String>,
    color: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = line_key(id, size, color)?;
    cart.set_quantity(key.clone(), quantity).await?;
    tracing::info!(line = %key, quantity = cart.quantity_of(&key.product_id), "Quantity updated");
    Ok(())
}

pub async fn clear(cart: &CartSynchronizer) -> Result<(), SyncError> {
    cart.clear().await?;
    tracing::info!("Cart cleared");
    Ok(())
}

pub fn total(cart: &CartSynchronizer) {
    tracing::info!(
        items = cart.item_count(),
        total = %cart.total().round_dp(2),
        availability = %cart.availability(),
        "Cart total"
    );
}
