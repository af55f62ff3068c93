//! Tenant domain type.
//!
//! The embedding widget sends the hostname of the page it is installed on.
//! That hostname is the tenant key: it selects the customer configuration,
//! scopes conversation and content queries, and keys the rate limiter.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`TenantDomain`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum DomainError {
    /// The input string is empty.
    #[error("domain cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character that is not valid in a hostname.
    #[error("domain contains invalid character: {0:?}")]
    InvalidCharacter(char),
    /// A dot-separated label is empty (leading, trailing, or doubled dot).
    #[error("domain has an empty label")]
    EmptyLabel,
}

/// A normalized tenant domain (hostname).
///
/// ## Constraints
///
/// - Length: 1-253 characters (RFC 1035 limit)
/// - Labels separated by dots, none empty
/// - Characters limited to ASCII alphanumerics and hyphens
/// - Normalized to lowercase; a scheme prefix and port are stripped
///
/// ## Examples
///
/// ```
/// use anchorchat_core::TenantDomain;
///
/// let domain = TenantDomain::parse("https://Shop.Example.com:443").unwrap();
/// assert_eq!(domain.as_str(), "shop.example.com");
///
/// assert!(TenantDomain::parse("").is_err());
/// assert!(TenantDomain::parse("bad domain").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TenantDomain(String);

impl TenantDomain {
    /// Maximum length of a hostname (RFC 1035).
    pub const MAX_LENGTH: usize = 253;

    /// Parse a `TenantDomain` from a string.
    ///
    /// Accepts bare hostnames as well as origins (`https://host:port`), which
    /// is what browsers hand the widget via `window.location`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, contains characters
    /// that are not valid in a hostname, or has an empty dot-separated label.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        let s = s
            .strip_prefix("https://")
            .or_else(|| s.strip_prefix("http://"))
            .unwrap_or(s);
        let s = s.split(['/', ':']).next().unwrap_or(s);

        if s.is_empty() {
            return Err(DomainError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(DomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let normalized = s.to_ascii_lowercase();

        for label in normalized.split('.') {
            if label.is_empty() {
                return Err(DomainError::EmptyLabel);
            }
            if let Some(c) = label.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
                return Err(DomainError::InvalidCharacter(c));
            }
        }

        Ok(Self(normalized))
    }

    /// Get the normalized domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for TenantDomain {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TenantDomain {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for TenantDomain {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_hostname() {
        let domain = TenantDomain::parse("shop.example.com").expect("valid");
        assert_eq!(domain.as_str(), "shop.example.com");
    }

    #[test]
    fn test_parse_normalizes_case() {
        let domain = TenantDomain::parse("Shop.EXAMPLE.com").expect("valid");
        assert_eq!(domain.as_str(), "shop.example.com");
    }

    #[test]
    fn test_parse_strips_scheme_port_and_path() {
        let domain = TenantDomain::parse("https://shop.example.com:8443/checkout").expect("valid");
        assert_eq!(domain.as_str(), "shop.example.com");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(TenantDomain::parse(""), Err(DomainError::Empty)));
        assert!(matches!(
            TenantDomain::parse("https://"),
            Err(DomainError::Empty)
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_characters() {
        assert!(matches!(
            TenantDomain::parse("bad domain.com"),
            Err(DomainError::InvalidCharacter(' '))
        ));
        assert!(matches!(
            TenantDomain::parse("shop_1.example.com"),
            Err(DomainError::InvalidCharacter('_'))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_labels() {
        assert!(matches!(
            TenantDomain::parse("shop..example.com"),
            Err(DomainError::EmptyLabel)
        ));
        assert!(matches!(
            TenantDomain::parse(".example.com"),
            Err(DomainError::EmptyLabel)
        ));
    }
}
