//! Tenant management commands.

use anchorchat_core::TenantDomain;

use super::CommandError;

/// Create a tenant organization with a widget domain.
///
/// Commerce credentials are added separately by updating the tenant's
/// `customer_config` row; a freshly created tenant answers from semantic
/// content search only.
pub async fn create(name: &str, domain: &str) -> Result<(), CommandError> {
    let domain = TenantDomain::parse(domain)
        .map_err(|e| CommandError::InvalidInput(format!("invalid domain: {e}")))?;

    let pool = super::connect().await?;

    let mut tx = pool.begin().await?;

    let org_id: i64 = sqlx::query_scalar(
        r"
        INSERT INTO organization (name)
        VALUES ($1)
        RETURNING id
        ",
    )
    .bind(name)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r"
        INSERT INTO customer_config (organization_id, domain)
        VALUES ($1, $2)
        ",
    )
    .bind(org_id)
    .bind(domain.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(org_id, %domain, "Tenant created");
    Ok(())
}
