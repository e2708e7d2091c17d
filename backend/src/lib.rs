//! # WebSoc API
//!
//! Course-section reconciliation engine for the WebSoc schedule of classes.
//!
//! The engine turns WebSoc's raw School → Department → Course → Section →
//! Meeting documents into a normalized, merged and deterministically sorted
//! tree. Requests are served from a relational cache of pre-isolated
//! section fragments when possible and from WebSoc otherwise, with large
//! requests split into batches that WebSoc accepts and retried with backoff.
//!
//! ## Architecture
//!
//! - [`models`]: canonical tree, time normalization, validated requests
//! - [`upstream`]: WebSoc client trait, raw document shape, reqwest client
//! - [`services`]: isolate / merge / sort, batch planner, serving and
//!   ingestion paths, background job tracking
//! - [`db`]: section cache trait with in-memory and Postgres backends
//! - [`config`]: TOML + environment configuration
//! - [`http`]: Axum-based HTTP server and request handlers

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod upstream;

#[cfg(feature = "http-server")]
pub mod http;
