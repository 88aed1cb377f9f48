//! SSO session storage contract.
//!
//! The engine only reads identities from a session; storing them after a
//! successful response is the transport's job.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::VerifiedIdentity;

/// Storage for identities that may be reused for SSO.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the identity stored under `key`.
    async fn load(&self, key: &str) -> Option<Arc<VerifiedIdentity>>;

    /// Stores an identity. Per-request fields must already be cleared.
    async fn store(&self, key: &str, identity: VerifiedIdentity);

    /// Removes the session under `key`.
    async fn remove(&self, key: &str);
}

/// Process-local session store.
///
/// Sessions expire a fixed time after they were stored.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, (Arc<VerifiedIdentity>, DateTime<Utc>)>,
    lifetime: Duration,
}

impl InMemorySessionStore {
    /// Creates a store whose sessions live for `lifetime`.
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            lifetime,
        }
    }

    /// Removes expired sessions. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, (_, expires)| *expires > now);
        before - self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, key: &str) -> Option<Arc<VerifiedIdentity>> {
        let entry = self.sessions.get(key)?;
        let (identity, expires) = entry.value();
        (*expires > Utc::now()).then(|| Arc::clone(identity))
    }

    async fn store(&self, key: &str, identity: VerifiedIdentity) {
        self.sessions.insert(
            key.to_string(),
            (
                Arc::new(identity),
                Utc::now()
                    .checked_add_signed(self.lifetime)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
        );
    }

    async fn remove(&self, key: &str) {
        self.sessions.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attribute;

    fn identity() -> VerifiedIdentity {
        VerifiedIdentity::builder("uid")
            .attribute(Attribute::single("uid", "alice"))
            .authn_context("urn:ctx")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn stores_and_loads() {
        let store = InMemorySessionStore::new(Duration::minutes(10));
        store.store("s1", identity()).await;
        assert_eq!(store.load("s1").await.unwrap().primary_value(), "alice");
        assert!(store.load("s2").await.is_none());

        store.remove("s1").await;
        assert!(store.load("s1").await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_not_returned() {
        let store = InMemorySessionStore::new(Duration::seconds(-1));
        store.store("s1", identity()).await;
        assert!(store.load("s1").await.is_none());
        assert_eq!(store.purge_expired(), 1);
    }
}
