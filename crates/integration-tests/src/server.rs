//! Fake commerce REST backend served over real HTTP.
//!
//! Answers the routes `HttpGateway` calls, under `/api`, with the envelope
//! shapes seen in production: the cart nested as `{"cart": {"items": [...]}}`
//! and the wishlist as `{"success": true, "data": [...]}`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use atelier_commerce::GatewayConfig;

/// Token the server accepts.
pub const TOKEN: &str = "test-token";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerLine {
    product_id: String,
    quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<String>,
}

impl ServerLine {
    fn matches(&self, id: &str, variant: &Variant) -> bool {
        self.product_id == id && self.size == variant.size && self.color == variant.color
    }
}

#[derive(Debug, Default, Deserialize)]
struct Variant {
    size: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddLine {
    product_id: String,
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
    product: Option<ProductInfo>,
}

#[derive(Debug, Deserialize)]
struct ProductInfo {
    name: Option<String>,
    price: Option<PriceInfo>,
}

#[derive(Debug, Deserialize)]
struct PriceInfo {
    amount: String,
}

#[derive(Debug, Deserialize)]
struct SetQuantity {
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddSaved {
    product_id: String,
}

#[derive(Default)]
struct ServerState {
    cart: Mutex<Vec<ServerLine>>,
    wishlist: Mutex<Vec<String>>,
    wishlist_disabled: AtomicBool,
    fail_next: AtomicBool,
    requests: Mutex<Vec<String>>,
}

type Shared = Arc<ServerState>;

/// Running fake backend. The server stops when this is dropped.
pub struct FakeServer {
    addr: SocketAddr,
    state: Shared,
    handle: JoinHandle<()>,
}

impl FakeServer {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = router(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL of the API.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/", self.addr)).unwrap()
    }

    /// Gateway configuration pointing at this server.
    #[must_use]
    pub fn gateway_config(&self, token: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            base_url: self.base_url(),
            token: token.map(|t| SecretString::from(t.to_string())),
            timeout: Duration::from_secs(5),
        }
    }

    /// Answer every wishlist route with 404.
    pub fn disable_wishlist(&self) {
        self.state.wishlist_disabled.store(true, Ordering::SeqCst);
    }

    /// Answer the next authorized request with 500.
    pub fn fail_next(&self) {
        self.state.fail_next.store(true, Ordering::SeqCst);
    }

    /// Put a line in the server cart.
    pub fn seed_cart_line(&self, product_id: &str, quantity: u32) {
        self.state.cart.lock().unwrap().push(ServerLine {
            product_id: product_id.to_string(),
            quantity,
            size: None,
            color: None,
            name: None,
            price: None,
        });
    }

    /// Server cart as `(product_id, quantity)` pairs.
    #[must_use]
    pub fn cart_quantities(&self) -> Vec<(String, u32)> {
        self.state
            .cart
            .lock()
            .unwrap()
            .iter()
            .map(|line| (line.product_id.clone(), line.quantity))
            .collect()
    }

    #[must_use]
    pub fn wishlist_ids(&self) -> Vec<String> {
        self.state.wishlist.lock().unwrap().clone()
    }

    /// Every request seen, as `METHOD /path?query`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/cart", get(get_cart).post(add_line).delete(clear_cart))
        .route("/cart/{id}", put(set_quantity).delete(remove_line))
        .route(
            "/wishlist",
            get(get_wishlist).post(add_saved).delete(clear_wishlist),
        )
        .route("/wishlist/{id}", delete(remove_saved));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), guard))
        .with_state(state)
}

/// Records the request, then applies auth, feature and failure switches.
async fn guard(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let uri = request.uri();
    let line = match uri.query() {
        Some(query) => format!("{} {}?{query}", request.method(), uri.path()),
        None => format!("{} {}", request.method(), uri.path()),
    };
    let is_wishlist = uri.path().starts_with("/api/wishlist");
    state.requests.lock().unwrap().push(line);

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TOKEN}"));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }
    if is_wishlist && state.wishlist_disabled.load(Ordering::SeqCst) {
        return (StatusCode::NOT_FOUND, "Cannot find route").into_response();
    }
    if state.fail_next.swap(false, Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database offline").into_response();
    }

    next.run(request).await
}

// =============================================================================
// Cart
// =============================================================================

fn cart_body(state: &ServerState) -> Json<Value> {
    let lines = state.cart.lock().unwrap().clone();
    Json(json!({ "cart": { "items": lines } }))
}

async fn get_cart(State(state): State<Shared>) -> Json<Value> {
    cart_body(&state)
}

async fn add_line(State(state): State<Shared>, Json(body): Json<AddLine>) -> Json<Value> {
    {
        let mut cart = state.cart.lock().unwrap();
        let variant = Variant {
            size: body.size.clone(),
            color: body.color.clone(),
        };
        if let Some(line) = cart
            .iter_mut()
            .find(|line| line.matches(&body.product_id, &variant))
        {
            line.quantity += body.quantity;
        } else {
            let (name, price) = body
                .product
                .map(|p| (p.name, p.price.map(|price| price.amount)))
                .unwrap_or_default();
            cart.push(ServerLine {
                product_id: body.product_id,
                quantity: body.quantity,
                size: body.size,
                color: body.color,
                name,
                price,
            });
        }
    }
    cart_body(&state)
}

async fn set_quantity(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<SetQuantity>,
) -> Json<Value> {
    {
        let variant = Variant {
            size: body.size,
            color: body.color,
        };
        let mut cart = state.cart.lock().unwrap();
        if let Some(line) = cart.iter_mut().find(|line| line.matches(&id, &variant)) {
            line.quantity = body.quantity;
        }
    }
    cart_body(&state)
}

async fn remove_line(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Query(variant): Query<Variant>,
) -> Json<Value> {
    state
        .cart
        .lock()
        .unwrap()
        .retain(|line| !line.matches(&id, &variant));
    cart_body(&state)
}

async fn clear_cart(State(state): State<Shared>) -> StatusCode {
    state.cart.lock().unwrap().clear();
    StatusCode::NO_CONTENT
}

// =============================================================================
// Wishlist
// =============================================================================

fn wishlist_body(state: &ServerState) -> Json<Value> {
    let items: Vec<Value> = state
        .wishlist
        .lock()
        .unwrap()
        .iter()
        .map(|id| json!({ "_id": id, "name": format!("Product {id}") }))
        .collect();
    Json(json!({ "success": true, "data": items }))
}

async fn get_wishlist(State(state): State<Shared>) -> Json<Value> {
    wishlist_body(&state)
}

async fn add_saved(State(state): State<Shared>, Json(body): Json<AddSaved>) -> Json<Value> {
    {
        let mut wishlist = state.wishlist.lock().unwrap();
        if !wishlist.contains(&body.product_id) {
            wishlist.push(body.product_id);
        }
    }
    wishlist_body(&state)
}

async fn remove_saved(State(state): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    state.wishlist.lock().unwrap().retain(|saved| *saved != id);
    wishlist_body(&state)
}

async fn clear_wishlist(State(state): State<Shared>) -> StatusCode {
    state.wishlist.lock().unwrap().clear();
    StatusCode::NO_CONTENT
}
