//! `HttpGateway` end to end against the fake REST backend.

#![allow(clippy::unwrap_used)]

use std::num::NonZeroU32;
use std::sync::Arc;

use atelier_commerce::{
    Cart, CartAttributes, CartGateway, CommerceGateway, CommerceState, GatewayError, HttpGateway,
    KeyValueStore, MemoryStore, SessionSignal, SyncError,
};
use atelier_core::{Availability, CartLineKey, ProductId};
use atelier_integration_tests::FakeServer;
use atelier_integration_tests::server::TOKEN;

fn state(server: &FakeServer, store: Arc<dyn KeyValueStore>) -> CommerceState {
    let gateway = HttpGateway::new(&server.gateway_config(Some(TOKEN))).unwrap();
    CommerceState::new(store, Arc::new(gateway), SessionSignal::new(false))
}

#[tokio::test]
async fn cart_round_trip() {
    let server = FakeServer::start().await;
    server.seed_cart_line("p1", 1);
    let state = state(&server, Arc::new(MemoryStore::new()));
    state.start_session(None).await;
    assert_eq!(state.cart().quantity_of(&ProductId::new("p1")), 1);

    state
        .cart()
        .add(
            ProductId::new("p2"),
            CartAttributes::with_quantity(NonZeroU32::new(2).unwrap()),
        )
        .await
        .unwrap();
    state.cart().set_quantity("p1", 4).await.unwrap();
    state.cart().remove("p2").await.unwrap();

    assert_eq!(server.cart_quantities(), [("p1".to_string(), 4)]);
    assert_eq!(state.cart().item_count(), 4);
}

#[tokio::test]
async fn missing_wishlist_feature_falls_back_to_local() {
    let server = FakeServer::start().await;
    server.disable_wishlist();
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let state = state(&server, Arc::clone(&store));
    state.start_session(None).await;

    assert_eq!(state.wishlist().availability(), Availability::LocalOnly);
    assert_eq!(state.cart().availability(), Availability::RemoteActive);

    let seen = server.requests().len();
    state.wishlist().toggle(ProductId::new("p1")).await.unwrap();
    assert!(state.wishlist().contains(&ProductId::new("p1")));
    assert_eq!(server.requests().len(), seen, "local-only mode stays offline");

    let flag = store
        .get("atelier:wishlist:remote_available")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flag, serde_json::Value::Bool(false));
}

#[tokio::test]
async fn rejected_token_is_not_authenticated() {
    let server = FakeServer::start().await;
    let gateway = HttpGateway::new(&server.gateway_config(Some("wrong"))).unwrap();

    let result = CommerceGateway::<Cart>::fetch_all(&gateway).await;
    assert!(matches!(result, Err(GatewayError::NotAuthenticated)));
}

#[tokio::test]
async fn server_error_rolls_back() {
    let server = FakeServer::start().await;
    server.seed_cart_line("p1", 2);
    let state = state(&server, Arc::new(MemoryStore::new()));
    state.start_session(None).await;

    server.fail_next();
    let result = state.cart().set_quantity("p1", 5).await;

    assert!(matches!(
        result,
        Err(SyncError::Transient(GatewayError::Api { status: 500, .. }))
    ));
    assert_eq!(state.cart().quantity_of(&ProductId::new("p1")), 2);
    assert_eq!(state.cart().availability(), Availability::RemoteActive);
}

#[tokio::test]
async fn clear_accepts_empty_response() {
    let server = FakeServer::start().await;
    server.seed_cart_line("p1", 1);
    let state = state(&server, Arc::new(MemoryStore::new()));
    state.start_session(None).await;

    state.cart().clear().await.unwrap();
    state.wishlist().clear().await.unwrap();

    assert!(state.cart().snapshot().items.is_empty());
    assert!(server.cart_quantities().is_empty());
    assert!(server.requests().contains(&"DELETE /api/cart".to_string()));
}

#[tokio::test]
async fn variant_selection_reaches_server() {
    let server = FakeServer::start().await;
    let gateway = HttpGateway::new(&server.gateway_config(Some(TOKEN))).unwrap();

    let attributes = CartAttributes {
        size: Some("M".to_string()),
        color: Some("navy blue".to_string()),
        ..CartAttributes::default()
    };
    let lines = CommerceGateway::<Cart>::add(
        &gateway,
        &ProductId::new("p1"),
        &attributes,
    )
    .await
    .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].size.as_deref(), Some("M"));

    let key = CartLineKey::new(
        ProductId::new("p1"),
        Some("M".to_string()),
        Some("navy blue".to_string()),
    );
    let lines = gateway
        .set_quantity(&key, NonZeroU32::new(3).unwrap())
        .await
        .unwrap();
    assert_eq!(lines[0].quantity.get(), 3);

    let lines = CommerceGateway::<Cart>::remove(&gateway, &key)
        .await
        .unwrap();
    assert!(lines.is_empty());
    assert!(
        server
            .requests()
            .contains(&"DELETE /api/cart/p1?size=M&color=navy+blue".to_string())
    );
}

#[tokio::test]
async fn wishlist_envelope_is_normalized() {
    let server = FakeServer::start().await;
    let state = state(&server, Arc::new(MemoryStore::new()));
    state.start_session(None).await;

    state.wishlist().add(ProductId::new("p1"), ()).await.unwrap();
    state.wishlist().toggle(ProductId::new("p2")).await.unwrap();

    let snapshot = state.wishlist().snapshot();
    let first = snapshot.items.iter().next().unwrap();
    assert_eq!(first.product_id.as_str(), "p1");
    assert_eq!(
        first.product.as_ref().and_then(|p| p.name.as_deref()),
        Some("Product p1")
    );
    assert_eq!(server.wishlist_ids(), ["p1", "p2"]);
}
