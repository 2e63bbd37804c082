//! Locale-aware static page resolution.
//!
//! Decides which (locale, route, params) pages must exist, builds them with
//! single-flight coalescing, and resolves incoming requests to a cached render,
//! an on-demand build, or not-found.

pub mod assembler;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod generation;
pub mod i18n;
pub mod manifest;
pub mod resolver;
pub mod retry;
pub mod routes;
pub mod server;
