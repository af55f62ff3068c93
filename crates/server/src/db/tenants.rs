//! Database operations for tenant configuration.
//!
//! The widget sends the page's hostname with every chat request; the
//! `customer_config` table maps that domain to an organization and its
//! commerce credentials. Lookups sit on the hot path, so resolved configs
//! are cached with a short TTL.

use std::time::Duration;

use anchorchat_core::{DomainError, OrganizationId, TenantDomain};
use sqlx::PgPool;
use tracing::instrument;

use super::RepositoryError;

const TENANT_CACHE_TTL: Duration = Duration::from_secs(60);
const TENANT_CACHE_CAPACITY: u64 = 10_000;

/// Per-domain tenant configuration.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    pub organization_id: OrganizationId,
    pub domain: TenantDomain,
    /// Commerce platform identifier (`woocommerce` or `shopify`), if connected.
    pub commerce_provider: Option<String>,
    /// Platform credential blob, shape depends on the provider.
    pub commerce_config: Option<serde_json::Value>,
    /// Per-tenant override of the default requests-per-minute quota.
    pub rate_limit_per_minute: Option<i32>,
    /// Extra system prompt text appended for this tenant.
    pub system_prompt: Option<String>,
}

/// Internal row type for `PostgreSQL` tenant config queries.
#[derive(Debug, sqlx::FromRow)]
struct TenantConfigRow {
    organization_id: i64,
    domain: String,
    commerce_provider: Option<String>,
    commerce_config: Option<serde_json::Value>,
    rate_limit_per_minute: Option<i32>,
    system_prompt: Option<String>,
}

impl TryFrom<TenantConfigRow> for TenantConfig {
    type Error = RepositoryError;

    fn try_from(row: TenantConfigRow) -> Result<Self, Self::Error> {
        let domain = TenantDomain::parse(&row.domain)
            .map_err(|e: DomainError| RepositoryError::DataCorruption(e.to_string()))?;
        Ok(Self {
            organization_id: OrganizationId::new(row.organization_id),
            domain,
            commerce_provider: row.commerce_provider,
            commerce_config: row.commerce_config,
            rate_limit_per_minute: row.rate_limit_per_minute,
            system_prompt: row.system_prompt,
        })
    }
}

/// Tenant configuration lookup, seam for the chat orchestration loop.
#[async_trait::async_trait]
pub trait TenantStore: Send + Sync {
    /// Look up the tenant configured for a domain.
    async fn get_by_domain(
        &self,
        domain: &TenantDomain,
    ) -> Result<Option<TenantConfig>, RepositoryError>;
}

/// Postgres-backed [`TenantStore`] with a per-domain moka cache.
pub struct TenantRepository {
    pool: PgPool,
    cache: moka::future::Cache<TenantDomain, Option<TenantConfig>>,
}

impl TenantRepository {
    /// Create a new tenant repository.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: moka::future::Cache::builder()
                .max_capacity(TENANT_CACHE_CAPACITY)
                .time_to_live(TENANT_CACHE_TTL)
                .build(),
        }
    }

    async fn fetch(&self, domain: &TenantDomain) -> Result<Option<TenantConfig>, RepositoryError> {
        let row: Option<TenantConfigRow> = sqlx::query_as(
            r"
            SELECT organization_id, domain, commerce_provider, commerce_config,
                   rate_limit_per_minute, system_prompt
            FROM customer_config
            WHERE domain = $1
            ",
        )
        .bind(domain.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait::async_trait]
impl TenantStore for TenantRepository {
    #[instrument(skip(self), fields(%domain))]
    async fn get_by_domain(
        &self,
        domain: &TenantDomain,
    ) -> Result<Option<TenantConfig>, RepositoryError> {
        if let Some(cached) = self.cache.get(domain).await {
            return Ok(cached);
        }

        let config = self.fetch(domain).await?;
        self.cache.insert(domain.clone(), config.clone()).await;
        Ok(config)
    }
}
