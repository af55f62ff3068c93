//! WooCommerce REST API adapter.
//!
//! Talks to the WooCommerce REST API v3 (`/wp-json/wc/v3/`) using
//! consumer-key/consumer-secret basic auth.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::{
    CommerceProvider, OrderLineItem, OrderSummary, Product, ProviderError, ProviderKind,
};

/// WooCommerce REST API adapter.
pub struct WooCommerceProvider {
    client: reqwest::Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: SecretString,
}

impl WooCommerceProvider {
    /// Create a new WooCommerce adapter.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Store base URL (e.g., `https://shop.example.com`)
    /// * `consumer_key` / `consumer_secret` - REST API credentials
    #[must_use]
    pub fn new(base_url: &str, consumer_key: &str, consumer_secret: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            consumer_key: consumer_key.to_string(),
            consumer_secret,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/wp-json/wc/v3/{path}", self.base_url);

        let response = self
            .client
            .get(&url)
            .basic_auth(
                &self.consumer_key,
                Some(self.consumer_secret.expose_secret()),
            )
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Parse(format!("WooCommerce response: {e}")))
    }
}

#[async_trait::async_trait]
impl CommerceProvider for WooCommerceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::WooCommerce
    }

    #[instrument(skip(self), fields(provider = "woocommerce"))]
    async fn search_products(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Product>, ProviderError> {
        let per_page = limit.clamp(1, 20).to_string();
        let rows: Vec<WooProduct> = self
            .get_json(
                "products",
                &[("search", query), ("per_page", &per_page), ("status", "publish")],
            )
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, email), fields(provider = "woocommerce"))]
    async fn lookup_order(
        &self,
        reference: &str,
        email: Option<&str>,
    ) -> Result<Option<OrderSummary>, ProviderError> {
        // Never leak an order to a visitor who can't name the billing email.
        let Some(email) = email else {
            return Ok(None);
        };

        // Order references from customers are the numeric order ID.
        let Ok(order_id) = reference.trim().trim_start_matches('#').parse::<i64>() else {
            return Ok(None);
        };

        let order: WooOrder = match self
            .get_json(&format!("orders/{order_id}"), &[])
            .await
        {
            Ok(order) => order,
            Err(ProviderError::Api { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let billing_email = order.billing.as_ref().map(|b| b.email.to_lowercase());
        if billing_email.as_deref() != Some(email.to_lowercase().as_str()) {
            return Ok(None);
        }

        Ok(Some(order.into()))
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 256;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", body.get(..end).unwrap_or_default())
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct WooProduct {
    id: i64,
    name: String,
    permalink: Option<String>,
    price: Option<String>,
    stock_status: Option<String>,
    short_description: Option<String>,
}

impl From<WooProduct> for Product {
    fn from(p: WooProduct) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name,
            url: p.permalink,
            price: p.price.filter(|s| !s.is_empty()),
            // WooCommerce reports currency at the store level, not per product.
            currency: None,
            stock_status: p.stock_status,
            description: p.short_description.map(|d| strip_tags(&d)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WooOrder {
    number: String,
    status: String,
    total: Option<String>,
    currency: Option<String>,
    billing: Option<WooBilling>,
    #[serde(default)]
    line_items: Vec<WooLineItem>,
}

#[derive(Debug, Deserialize)]
struct WooBilling {
    email: String,
}

#[derive(Debug, Deserialize)]
struct WooLineItem {
    name: String,
    quantity: i64,
}

impl From<WooOrder> for OrderSummary {
    fn from(o: WooOrder) -> Self {
        Self {
            reference: o.number,
            status: o.status,
            total: o.total,
            currency: o.currency,
            line_items: o
                .line_items
                .into_iter()
                .map(|i| OrderLineItem {
                    name: i.name,
                    quantity: i.quantity,
                })
                .collect(),
        }
    }
}

/// Strip HTML tags from WooCommerce short descriptions.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}
