//! REST adapter for the commerce backend.
//!
//! Uses `reqwest` 0.13 with a per-client timeout. The bearer credential is
//! held in memory only and swapped at session boundaries.

use core::num::NonZeroU32;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use atelier_core::{CartLine, CartLineKey, ProductId, WishlistItem};

use super::conversions::{
    AddCartLineBody, AddWishlistItemBody, SetQuantityBody, cart_lines, parse_body, wishlist_items,
};
use super::{CartGateway, CommerceGateway, GatewayError, SessionCredentials};
use crate::config::GatewayConfig;
use crate::entity::{Cart, CartAttributes, EntityKind, Wishlist};

// =============================================================================
// HttpGateway
// =============================================================================

/// HTTP client for the cart and wishlist endpoints.
///
/// Cheaply cloneable; clones share the connection pool and the credential.
#[derive(Clone)]
pub struct HttpGateway {
    inner: Arc<HttpGatewayInner>,
}

struct HttpGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl HttpGateway {
    /// Create a gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(HttpGatewayInner {
                client,
                base_url: config.base_url.clone(),
                token: RwLock::new(config.token.clone()),
            }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Whether a credential is currently set.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Parse(format!("{} cannot be a base URL", self.inner.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the decoded body.
    ///
    /// `Value::Null` stands for an empty body.
    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Value, GatewayError> {
        let token = self
            .inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(GatewayError::NotAuthenticated)?;

        let mut request = self
            .inner
            .client
            .request(method.clone(), url.clone())
            .bearer_auth(token.expose_secret())
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Http(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Http(e)
            }
        })?;

        if !status.is_success() {
            return Err(status_error(status, url.path(), &text));
        }

        debug!(%method, path = url.path(), status = status.as_u16(), "Commerce request succeeded");
        parse_body(&text)
    }
}

fn status_error(status: StatusCode, path: &str, body: &str) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::NotAuthenticated,
        StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED => {
            GatewayError::Unavailable(format!("{path} ({status})"))
        }
        _ => {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Commerce API returned non-success status"
            );
            GatewayError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            }
        }
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SessionCredentials for HttpGateway {
    fn set_credential(&self, token: SecretString) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    fn clear_credential(&self) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// =============================================================================
// Cart routes
// =============================================================================

#[async_trait]
impl CommerceGateway<Cart> for HttpGateway {
    #[instrument(skip(self), fields(kind = Cart::NAME))]
    async fn fetch_all(&self) -> Result<Vec<CartLine>, GatewayError> {
        let url = self.url(&[Cart::NAME])?;
        cart_lines(self.send::<()>(Method::GET, url, None).await?)
    }

    #[instrument(skip(self, attributes), fields(kind = Cart::NAME, product_id = %id))]
    async fn add(
        &self,
        id: &ProductId,
        attributes: &CartAttributes,
    ) -> Result<Vec<CartLine>, GatewayError> {
        let url = self.url(&[Cart::NAME])?;
        let body = AddCartLineBody {
            product_id: id,
            quantity: attributes.quantity.get(),
            size: attributes.size.as_deref(),
            color: attributes.color.as_deref(),
            product: attributes.product.as_ref(),
        };
        cart_lines(self.send(Method::POST, url, Some(&body)).await?)
    }

    #[instrument(skip(self), fields(kind = Cart::NAME, line = %key))]
    async fn remove(&self, key: &CartLineKey) -> Result<Vec<CartLine>, GatewayError> {
        let mut url = self.url(&[Cart::NAME, key.product_id.as_str()])?;
        append_variant(&mut url, key);
        cart_lines(self.send::<()>(Method::DELETE, url, None).await?)
    }

    #[instrument(skip(self), fields(kind = Cart::NAME))]
    async fn clear(&self) -> Result<(), GatewayError> {
        let url = self.url(&[Cart::NAME])?;
        self.send::<()>(Method::DELETE, url, None).await?;
        Ok(())
    }
}

#[async_trait]
impl CartGateway for HttpGateway {
    #[instrument(skip(self), fields(kind = Cart::NAME, line = %key))]
    async fn set_quantity(
        &self,
        key: &CartLineKey,
        quantity: NonZeroU32,
    ) -> Result<Vec<CartLine>, GatewayError> {
        let url = self.url(&[Cart::NAME, key.product_id.as_str()])?;
        let body = SetQuantityBody {
            quantity: quantity.get(),
            size: key.size.as_deref(),
            color: key.color.as_deref(),
        };
        cart_lines(self.send(Method::PUT, url, Some(&body)).await?)
    }
}

fn append_variant(url: &mut Url, key: &CartLineKey) {
    if key.size.is_none() && key.color.is_none() {
        return;
    }
    let mut query = url.query_pairs_mut();
    if let Some(size) = &key.size {
        query.append_pair("size", size);
    }
    if let Some(color) = &key.color {
        query.append_pair("color", color);
    }
}

// =============================================================================
// Wishlist routes
// =============================================================================

#[async_trait]
impl CommerceGateway<Wishlist> for HttpGateway {
    #[instrument(skip(self), fields(kind = Wishlist::NAME))]
    async fn fetch_all(&self) -> Result<Vec<WishlistItem>, GatewayError> {
        let url = self.url(&[Wishlist::NAME])?;
        wishlist_items(self.send::<()>(Method::GET, url, None).await?)
    }

    #[instrument(skip(self, _attributes), fields(kind = Wishlist::NAME, product_id = %id))]
    async fn add(&self, id: &ProductId, _attributes: &()) -> Result<Vec<WishlistItem>, GatewayError> {
        let url = self.url(&[Wishlist::NAME])?;
        let body = AddWishlistItemBody { product_id: id };
        wishlist_items(self.send(Method::POST, url, Some(&body)).await?)
    }

    #[instrument(skip(self), fields(kind = Wishlist::NAME, product_id = %id))]
    async fn remove(&self, id: &ProductId) -> Result<Vec<WishlistItem>, GatewayError> {
        let url = self.url(&[Wishlist::NAME, id.as_str()])?;
        wishlist_items(self.send::<()>(Method::DELETE, url, None).await?)
    }

    #[instrument(skip(self), fields(kind = Wishlist::NAME))]
    async fn clear(&self) -> Result<(), GatewayError> {
        let url = self.url(&[Wishlist::NAME])?;
        self.send::<()>(Method::DELETE, url, None).await?;
        Ok(())
    }
}
