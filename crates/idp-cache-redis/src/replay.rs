//! Redis-backed replay cache.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use idp_cache::{CacheError, CacheResult, ReplayCache};
use tracing::{debug, warn};

use crate::config::RedisConfig;
use crate::error::from_redis_error;

/// Replay cache shared between IdP instances through Redis.
///
/// Each identifier is stored with `SET key 1 PX ttl NX`, so admission is a
/// single atomic command and expiry is handled by the server.
pub struct RedisReplayCache {
    client: Client,
    config: RedisConfig,
}

impl RedisReplayCache {
    /// Connects to Redis.
    ///
    /// ## Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn new(config: RedisConfig) -> CacheResult<Self> {
        let redis_config = Config::from_url(&config.connection_url())
            .map_err(|e| CacheError::Configuration(e.to_string()))?;

        let client = Client::new(
            redis_config,
            None,
            None,
            Some(ReconnectPolicy::new_exponential(0, 1000, 30_000, 2)),
        );

        tokio::time::timeout(config.connect_timeout(), client.init())
            .await
            .map_err(|_| CacheError::Timeout)?
            .map_err(from_redis_error)?;

        debug!(prefix = %config.key_prefix, "connected replay cache to redis");
        Ok(Self { client, config })
    }

    /// Returns the underlying Redis client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    async fn bounded<T, F>(&self, command: F) -> CacheResult<T>
    where
        F: Future<Output = Result<T, fred::error::Error>> + Send,
    {
        match tokio::time::timeout(self.config.command_timeout(), command).await {
            Ok(result) => result.map_err(from_redis_error),
            Err(_) => {
                warn!("redis replay command timed out");
                Err(CacheError::Timeout)
            }
        }
    }
}

/// Converts a TTL to whole milliseconds for `PX`, never less than one.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn ttl_millis(ttl: Duration) -> i64 {
    ttl.as_millis().clamp(1, i64::MAX as u128) as i64
}

#[async_trait]
impl ReplayCache for RedisReplayCache {
    async fn is_replay(&self, context: &str, id: &str) -> CacheResult<bool> {
        let key = self.config.replay_key(context, id);
        let count: i64 = self.bounded(self.client.exists(&key)).await?;
        Ok(count > 0)
    }

    async fn record(&self, context: &str, id: &str, ttl: Duration) -> CacheResult<bool> {
        let key = self.config.replay_key(context, id);
        let result: Option<String> = self
            .bounded(self.client.set(
                &key,
                "1",
                Some(Expiration::PX(ttl_millis(ttl))),
                Some(SetOptions::NX),
                false,
            ))
            .await?;

        Ok(result.is_some())
    }
}
