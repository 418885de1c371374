//! bex-client: Tracking-service access for backlog exports.
//!
//! This crate provides:
//! - `TrackerClient`: the async interface the export pipeline consumes
//! - `fetch_items_chunked`: bounded-concurrency batch fetching
//! - `RestClient`: the PAT-authenticated REST implementation
//! - `Cache` / `CachingClient`: response caching for slow-changing data

pub mod cache;
pub mod client;
pub mod error;
pub mod rest;

pub use cache::{Cache, CachingClient};
pub use client::{
    combine_wiql, fetch_items_chunked, StateColors, TrackerClient, CHUNK_SIZE, MAX_IN_FLIGHT,
};
pub use error::{ClientError, Result};
pub use rest::RestClient;
