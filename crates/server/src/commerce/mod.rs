//! Commerce provider abstraction.
//!
//! Tenants connect their storefront so the assistant can answer product and
//! order questions with live data. Each platform gets a thin adapter over its
//! REST API behind the [`CommerceProvider`] trait; the orchestration loop
//! never knows which platform it is talking to.
//!
//! Provider failures never fail a chat request: the tool executor converts
//! them into error tool results and the model answers from what it has.

mod resolver;
mod shopify;
mod woocommerce;

pub use resolver::{CachingCommerceResolver, CommerceResolver};
pub use shopify::ShopifyProvider;
pub use woocommerce::WooCommerceProvider;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to a commerce platform.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform API returned an error status.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// Failed to parse the platform response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The provider does not support the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Which commerce platform an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    WooCommerce,
    Shopify,
}

impl ProviderKind {
    /// Parse a provider kind from its configuration string.
    #[must_use]
    pub fn from_config(s: &str) -> Option<Self> {
        match s {
            "woocommerce" => Some(Self::WooCommerce),
            "shopify" => Some(Self::Shopify),
            _ => None,
        }
    }
}

/// A product returned by a commerce search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Platform product ID.
    pub id: String,
    /// Product name.
    pub name: String,
    /// Canonical product URL.
    pub url: Option<String>,
    /// Price as the platform reports it (decimal string).
    pub price: Option<String>,
    /// ISO currency code, when the platform reports one.
    pub currency: Option<String>,
    /// Stock status (e.g., "instock", "outofstock").
    pub stock_status: Option<String>,
    /// Short plain-text description.
    pub description: Option<String>,
}

/// A line item within an order summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    /// Product name.
    pub name: String,
    /// Quantity ordered.
    pub quantity: i64,
}

/// A summarized order for status lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Order number or reference as shown to the customer.
    pub reference: String,
    /// Order status (e.g., "processing", "completed", "fulfilled").
    pub status: String,
    /// Order total as the platform reports it.
    pub total: Option<String>,
    /// ISO currency code.
    pub currency: Option<String>,
    /// Summarized line items.
    pub line_items: Vec<OrderLineItem>,
}

/// A commerce platform adapter.
#[async_trait::async_trait]
pub trait CommerceProvider: Send + Sync {
    /// Which platform this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Search the product catalog.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the platform request fails.
    async fn search_products(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Product>, ProviderError>;

    /// Look up an order by its customer-facing reference.
    ///
    /// The optional email is matched against the order's billing email when
    /// the platform returns one, so a visitor cannot fish for someone else's
    /// order by number alone.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the platform request fails.
    async fn lookup_order(
        &self,
        reference: &str,
        email: Option<&str>,
    ) -> Result<Option<OrderSummary>, ProviderError>;
}

/// Summarize products for a tool result, minimizing tokens.
#[must_use]
pub fn summarize_products(products: &[Product]) -> serde_json::Value {
    let summaries: Vec<serde_json::Value> = products
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name,
                "price": p.price,
                "currency": p.currency,
                "stock_status": p.stock_status,
                "url": p.url,
                "description": p.description,
            })
        })
        .collect();

    serde_json::json!({
        "count": summaries.len(),
        "products": summaries,
    })
}

/// Summarize an order for a tool result.
#[must_use]
pub fn summarize_order(order: &OrderSummary) -> serde_json::Value {
    let items: Vec<serde_json::Value> = order
        .line_items
        .iter()
        .map(|i| serde_json::json!({"name": i.name, "quantity": i.quantity}))
        .collect();

    serde_json::json!({
        "reference": order.reference,
        "status": order.status,
        "total": order.total,
        "currency": order.currency,
        "line_items": items,
    })
}
