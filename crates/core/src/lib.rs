//! Anchorchat Core - Shared types library.
//!
//! This crate provides common types used across all Anchorchat components:
//! - `server` - Support chat API (chat endpoint, orchestration, search)
//! - `cli` - Command-line tools for migrations and index seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, roles, and tenant domains

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
