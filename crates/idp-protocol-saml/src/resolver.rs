//! Peer metadata resolution.
//!
//! The engine looks up the metadata of the requesting service provider by
//! its entity ID. Where metadata comes from (files, federation feeds, a
//! database) is up to the implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::PeerMetadata;

/// Source of service provider metadata.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Returns the metadata for `entity_id`, or `None` if the peer is unknown.
    async fn resolve(&self, entity_id: &str) -> Option<Arc<PeerMetadata>>;
}

/// Metadata resolver backed by a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryMetadataResolver {
    peers: RwLock<HashMap<String, Arc<PeerMetadata>>>,
}

impl InMemoryMetadataResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver holding the given peers.
    #[must_use]
    pub fn with_peers(peers: impl IntoIterator<Item = PeerMetadata>) -> Self {
        let resolver = Self::new();
        for peer in peers {
            resolver.insert(peer);
        }
        resolver
    }

    /// Adds or replaces a peer.
    pub fn insert(&self, peer: PeerMetadata) {
        self.peers
            .write()
            .insert(peer.entity_id.clone(), Arc::new(peer));
    }

    /// Removes a peer. Returns true if it was registered.
    pub fn remove(&self, entity_id: &str) -> bool {
        self.peers.write().remove(entity_id).is_some()
    }

    /// Returns the number of registered peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Returns true if no peers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

#[async_trait]
impl MetadataResolver for InMemoryMetadataResolver {
    async fn resolve(&self, entity_id: &str) -> Option<Arc<PeerMetadata>> {
        self.peers.read().get(entity_id).cloned()
    }
}
