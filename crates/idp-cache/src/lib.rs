//! # idp-cache
//!
//! Replay cache abstraction for the identity provider.
//!
//! The engine records the identifier of every accepted authentication
//! request so that the same message cannot be processed twice while it is
//! still fresh.
//!
//! - [`ReplayCache`] - Atomic check-and-record of message identifiers
//! - [`InMemoryReplayCache`] - Process-local implementation
//!
//! A shared Redis implementation lives in `idp-cache-redis`.
//!
//! ## Example
//!
//! ```ignore
//! use idp_cache::{CacheResult, ReplayCache};
//! use std::time::Duration;
//!
//! async fn admit(cache: &impl ReplayCache, id: &str) -> CacheResult<bool> {
//!     cache.record("authn-requests", id, Duration::from_secs(300)).await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod replay;

pub use error::{CacheError, CacheResult};
pub use memory::InMemoryReplayCache;
pub use replay::ReplayCache;
