//! Anchorchat server library.
//!
//! Chat orchestration for embedded store-support widgets: the widget posts
//! visitor messages, the server resolves the tenant by domain, runs the
//! model tool loop against the tenant's commerce platform and scraped
//! content, and returns the answer with source links.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod commerce;
pub mod config;
pub mod db;
pub mod model;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;
