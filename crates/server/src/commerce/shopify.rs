//! Shopify Admin REST API adapter.
//!
//! Authenticates with a per-store access token via the
//! `X-Shopify-Access-Token` header.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::{
    CommerceProvider, OrderLineItem, OrderSummary, Product, ProviderError, ProviderKind,
};

const SHOPIFY_API_VERSION: &str = "2024-10";

/// Shopify Admin REST API adapter.
pub struct ShopifyProvider {
    client: reqwest::Client,
    store: String,
    access_token: SecretString,
    api_version: String,
}

impl ShopifyProvider {
    /// Create a new Shopify adapter.
    ///
    /// # Arguments
    ///
    /// * `store` - Store domain (e.g., `your-store.myshopify.com`)
    /// * `access_token` - Admin API access token
    #[must_use]
    pub fn new(store: &str, access_token: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            store: store.to_string(),
            access_token,
            api_version: SHOPIFY_API_VERSION.to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!(
            "https://{}/admin/api/{}/{path}",
            self.store, self.api_version
        );

        let response = self
            .client
            .get(&url)
            .header("X-Shopify-Access-Token", self.access_token.expose_secret())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Parse(format!("Shopify response: {e}")))
    }

    fn product_url(&self, handle: &str) -> String {
        format!("https://{}/products/{handle}", self.store)
    }
}

#[async_trait::async_trait]
impl CommerceProvider for ShopifyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Shopify
    }

    #[instrument(skip(self), fields(provider = "shopify"))]
    async fn search_products(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Product>, ProviderError> {
        let limit_str = limit.clamp(1, 20).to_string();
        let result: ShopifyProducts = self
            .get_json(
                "products.json",
                &[
                    ("title", query),
                    ("limit", &limit_str),
                    ("status", "active"),
                ],
            )
            .await?;

        Ok(result
            .products
            .into_iter()
            .map(|p| {
                let url = p.handle.as_deref().map(|h| self.product_url(h));
                let variant = p.variants.first();
                Product {
                    id: p.id.to_string(),
                    name: p.title,
                    url,
                    price: variant.map(|v| v.price.clone()),
                    currency: None,
                    stock_status: variant.map(|v| {
                        if v.inventory_quantity.unwrap_or(0) > 0 {
                            "instock".to_string()
                        } else {
                            "outofstock".to_string()
                        }
                    }),
                    description: p.body_html.map(|d| strip_tags(&d)),
                }
            })
            .collect())
    }

    #[instrument(skip(self, email), fields(provider = "shopify"))]
    async fn lookup_order(
        &self,
        reference: &str,
        email: Option<&str>,
    ) -> Result<Option<OrderSummary>, ProviderError> {
        // Never leak an order to a visitor who can't name the order email.
        let Some(email) = email else {
            return Ok(None);
        };

        let name = if reference.starts_with('#') {
            reference.to_string()
        } else {
            format!("#{reference}")
        };

        let result: ShopifyOrders = self
            .get_json("orders.json", &[("name", &name), ("status", "any")])
            .await?;

        let Some(order) = result.orders.into_iter().next() else {
            return Ok(None);
        };

        let order_email = order.email.as_ref().map(|e| e.to_lowercase());
        if order_email.as_deref() != Some(email.to_lowercase().as_str()) {
            return Ok(None);
        }

        Ok(Some(OrderSummary {
            reference: order.name,
            status: order
                .fulfillment_status
                .unwrap_or_else(|| "unfulfilled".to_string()),
            total: order.total_price,
            currency: order.currency,
            line_items: order
                .line_items
                .into_iter()
                .map(|i| OrderLineItem {
                    name: i.title,
                    quantity: i.quantity,
                })
                .collect(),
        }))
    }
}

/// Strip HTML tags from Shopify body HTML.
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

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ShopifyProducts {
    products: Vec<ShopifyProduct>,
}

#[derive(Debug, Deserialize)]
struct ShopifyProduct {
    id: i64,
    title: String,
    handle: Option<String>,
    body_html: Option<String>,
    #[serde(default)]
    variants: Vec<ShopifyVariant>,
}

#[derive(Debug, Deserialize)]
struct ShopifyVariant {
    price: String,
    inventory_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ShopifyOrders {
    orders: Vec<ShopifyOrder>,
}

#[derive(Debug, Deserialize)]
struct ShopifyOrder {
    name: String,
    email: Option<String>,
    fulfillment_status: Option<String>,
    total_price: Option<String>,
    currency: Option<String>,
    #[serde(default)]
    line_items: Vec<ShopifyLineItem>,
}

#[derive(Debug, Deserialize)]
struct ShopifyLineItem {
    title: String,
    quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shopify_products_deserialization() {
        let json = r#"{
            "products": [{
                "id": 632910392,
                "title": "IPod Nano - 8GB",
                "handle": "ipod-nano",
                "body_html": "<p>It's the small iPod.</p>",
                "variants": [{"price": "199.00", "inventory_quantity": 10}]
            }]
        }"#;

        let result: ShopifyProducts = serde_json::from_str(json).expect("deserialize");
        assert_eq!(result.products.len(), 1);
        let product = result.products.first().expect("product");
        assert_eq!(product.title, "IPod Nano - 8GB");
        assert_eq!(
            product.variants.first().expect("variant").price,
            "199.00"
        );
    }

    #[test]
    fn test_shopify_orders_deserialization() {
        let json = r##"{
            "orders": [{
                "name": "#1001",
                "email": "anna@example.com",
                "fulfillment_status": "fulfilled",
                "total_price": "199.00",
                "currency": "USD",
                "line_items": [{"title": "IPod Nano - 8GB", "quantity": 1}]
            }]
        }"##;

        let result: ShopifyOrders = serde_json::from_str(json).expect("deserialize");
        let order = result.orders.first().expect("order");
        assert_eq!(order.name, "#1001");
        assert_eq!(order.fulfillment_status.as_deref(), Some("fulfilled"));
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>It's the small iPod.</p>"), "It's the small iPod.");
    }

    #[tokio::test]
    async fn test_lookup_order_without_email_returns_nothing() {
        // The guard fires before any request, so no store is contacted.
        let provider = ShopifyProvider::new(
            "example.myshopify.com",
            SecretString::from("shpat_test"),
        );

        let result = provider.lookup_order("1001", None).await.expect("lookup");
        assert!(result.is_none());
    }
}
