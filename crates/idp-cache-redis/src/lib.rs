//! # idp-cache-redis
//!
//! Redis replay cache for the identity provider.
//!
//! This crate implements [`idp_cache::ReplayCache`] on top of the `fred`
//! client so several IdP instances can share replay state.
//!
//! ## Features
//!
//! - Automatic reconnection with exponential backoff
//! - TLS support
//! - Key prefixing for shared Redis deployments
//! - Bounded command latency
//!
//! ## Example
//!
//! ```ignore
//! use idp_cache::ReplayCache;
//! use idp_cache_redis::{RedisConfig, RedisReplayCache};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = RedisReplayCache::new(RedisConfig::default().host("localhost")).await?;
//!     let fresh = cache.record("authn-requests", "_id", Duration::from_secs(300)).await?;
//!     assert!(fresh);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod replay;

pub use config::RedisConfig;
pub use replay::RedisReplayCache;
