//! Replay cache.
//!
//! Remembers message identifiers for a bounded time so that a message seen
//! once is rejected when it arrives again. Identifiers are namespaced by a
//! context string; the same identifier may be admitted once per context.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

/// Replay detection cache.
///
/// Implementations must be safe to share between concurrent requests. For any
/// `(context, id)` pair, at most one concurrent [`record`](Self::record) call
/// may observe `true` while the entry is live.
#[async_trait]
pub trait ReplayCache: Send + Sync {
    /// Returns true if `id` is currently recorded under `context`.
    ///
    /// This is a read-only lookup. Callers deciding whether to admit a message
    /// must use [`record`](Self::record), never a lookup followed by an insert.
    async fn is_replay(&self, context: &str, id: &str) -> CacheResult<bool>;

    /// Atomically records `id` under `context` for `ttl`.
    ///
    /// Returns `true` if the identifier was newly admitted and `false` if a
    /// live entry already existed, which means the message is a replay.
    async fn record(&self, context: &str, id: &str, ttl: Duration) -> CacheResult<bool>;
}
