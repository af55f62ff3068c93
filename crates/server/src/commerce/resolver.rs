//! Tenant-to-provider resolution.
//!
//! Tenant commerce credentials live in the `customer_config` table. Building
//! a provider from them on every request would re-parse the credential blob
//! each time, so resolved providers are cached per domain with a short TTL;
//! credential changes take effect within five minutes without a restart.

use std::sync::Arc;
use std::time::Duration;

use anchorchat_core::TenantDomain;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::warn;

use super::{CommerceProvider, ProviderKind, ShopifyProvider, WooCommerceProvider};
use crate::db::TenantConfig;

const RESOLVER_CACHE_TTL: Duration = Duration::from_secs(300);
const RESOLVER_CACHE_CAPACITY: u64 = 1_000;

/// Resolves a tenant's configuration to a live commerce provider.
///
/// Returns `None` when the tenant has no commerce platform connected, in
/// which case the assistant falls back to semantic content search alone.
#[async_trait::async_trait]
pub trait CommerceResolver: Send + Sync {
    /// Build (or fetch a cached) provider for the given tenant.
    async fn resolve(&self, config: &TenantConfig) -> Option<Arc<dyn CommerceProvider>>;
}

/// Commerce credential blob stored in `customer_config.commerce_config`.
#[derive(Debug, Deserialize)]
struct CommerceCredentials {
    /// Base storefront URL (WooCommerce) or store domain (Shopify).
    store_url: Option<String>,
    /// WooCommerce REST API consumer key.
    consumer_key: Option<String>,
    /// WooCommerce REST API consumer secret.
    consumer_secret: Option<String>,
    /// Shopify Admin API access token.
    access_token: Option<String>,
}

/// Default [`CommerceResolver`] backed by a per-domain moka cache.
pub struct CachingCommerceResolver {
    cache: moka::future::Cache<TenantDomain, Option<Arc<dyn CommerceProvider>>>,
}

impl CachingCommerceResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: moka::future::Cache::builder()
                .max_capacity(RESOLVER_CACHE_CAPACITY)
                .time_to_live(RESOLVER_CACHE_TTL)
                .build(),
        }
    }

    fn build_provider(config: &TenantConfig) -> Option<Arc<dyn CommerceProvider>> {
        let provider = config.commerce_provider.as_deref()?;
        let Some(kind) = ProviderKind::from_config(provider) else {
            warn!(domain = %config.domain, provider, "unknown commerce provider in config");
            return None;
        };

        let raw = config.commerce_config.clone()?;
        let creds: CommerceCredentials = match serde_json::from_value(raw) {
            Ok(creds) => creds,
            Err(e) => {
                warn!(domain = %config.domain, error = %e, "malformed commerce credentials");
                return None;
            }
        };

        match kind {
            ProviderKind::WooCommerce => {
                let (Some(store_url), Some(key), Some(secret)) = (
                    creds.store_url,
                    creds.consumer_key,
                    creds.consumer_secret,
                ) else {
                    warn!(domain = %config.domain, "incomplete WooCommerce credentials");
                    return None;
                };
                Some(Arc::new(WooCommerceProvider::new(
                    &store_url,
                    &key,
                    SecretString::from(secret),
                )))
            }
            ProviderKind::Shopify => {
                let (Some(store), Some(token)) = (creds.store_url, creds.access_token) else {
                    warn!(domain = %config.domain, "incomplete Shopify credentials");
                    return None;
                };
                Some(Arc::new(ShopifyProvider::new(
                    &store,
                    SecretString::from(token),
                )))
            }
        }
    }
}

impl Default for CachingCommerceResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CommerceResolver for CachingCommerceResolver {
    async fn resolve(&self, config: &TenantConfig) -> Option<Arc<dyn CommerceProvider>> {
        let config = config.clone();
        self.cache
            .get_with(config.domain.clone(), async move {
                Self::build_provider(&config)
            })
            .await
    }
}
