//! Core types for Anchorchat.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod domain;
pub mod id;
pub mod role;

pub use domain::{DomainError, TenantDomain};
pub use id::*;
pub use role::{MemberRole, MessageRole};
