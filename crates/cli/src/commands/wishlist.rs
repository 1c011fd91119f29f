//! Wishlist commands.

use atelier_commerce::{CartAttributes, CommerceState, SyncError, WishlistSynchronizer};

use super::cart::product_id;

pub fn list(wishlist: &WishlistSynchronizer) {
    let snapshot = wishlist.snapshot();
    if snapshot.items.is_empty() {
        tracing::info!(availability = %snapshot.availability, "Wishlist is empty");
        return;
    }

    for item in snapshot.items.iter() {
        let name = item
            .product
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .unwrap_or("-");
        tracing::info!("{} {name}", item.product_id);
    }
    total(wishlist);
}

pub async fn add(wishlist: &WishlistSynchronizer, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = product_id(id)?;
    wishlist.add(id.clone(), ()).await?;
    tracing::info!(product_id = %id, "Saved to wishlist");
    Ok(())
}

pub async fn remove(
    wishlist: &WishlistSynchronizer,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = product_id(id)?;
    wishlist.remove(id.clone()).await?;
    tracing::info!(product_id = %id, "Removed from wishlist");
    Ok(())
}

pub async fn toggle(
    wishlist: &WishlistSynchronizer,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = product_id(id)?;
    wishlist.toggle(id.clone()).await?;
    if wishlist.contains(&id) {
        tracing::info!(product_id = %id, "Saved to wishlist");
    } else {
        tracing::info!(product_id = %id, "Removed from wishlist");
    }
    Ok(())
}

pub async fn move_to_cart(
    state: &CommerceState,
    id: &str,
    attributes: CartAttributes,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = product_id(id)?;
    state.move_to_cart(id.clone(), attributes).await?;
    tracing::info!(product_id = %id, "Moved to cart");
    Ok(())
}

pub async fn clear(wishlist: &WishlistSynchronizer) -> Result<(), SyncError> {
    wishlist.clear().await?;
    tracing::info!("Wishlist cleared");
    Ok(())
}

pub fn total(wishlist: &WishlistSynchronizer) {
    tracing::info!(
        items = wishlist.total(),
        availability = %wishlist.availability(),
        "Wishlist total"
    );
}
