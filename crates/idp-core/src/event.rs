//! Audit events for the identity provider.
//!
//! Every authentication request produces a trail of events: receipt, the
//! user authentication step, and exactly one terminal event describing what
//! was sent back (a success response, an error response, or nothing at all
//! because the request could not be answered safely).
//!
//! All events include:
//! - Timestamp (ISO 8601)
//! - Event type
//! - Peer entity and request identifier (when known)
//! - Outcome (success/failure)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// An authentication request was received and decoded.
    AuthnRequestReceived,
    /// User authentication is about to start.
    PreUserAuthentication,
    /// User authentication finished.
    PostUserAuthentication,
    /// A success response was issued.
    SuccessResponse,
    /// A protocol error response was issued.
    ErrorResponse,
    /// The request could not be answered with a protocol message.
    UnrecoverableError,
}

impl EventType {
    /// Returns true if this event ends the processing of a request.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::SuccessResponse | Self::ErrorResponse | Self::UnrecoverableError
        )
    }
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// An audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,

    /// Timestamp of the event (ISO 8601).
    pub timestamp: DateTime<Utc>,

    /// Type of event.
    pub event_type: EventType,

    /// Outcome of the event.
    pub outcome: EventOutcome,

    /// Entity ID of the requesting service provider.
    pub peer_entity_id: Option<String>,

    /// Identifier of the authentication request.
    pub request_id: Option<String>,

    /// Primary identifier of the authenticated user.
    pub user: Option<String>,

    /// Source IP address.
    pub ip_address: Option<String>,

    /// Error code or message (for failure events).
    pub error: Option<String>,

    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl Event {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType) -> EventBuilder {
        EventBuilder::new(event_type)
    }

    /// Looks up a detail value by key.
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Builder for creating events.
pub struct EventBuilder {
    event_type: EventType,
    outcome: EventOutcome,
    peer_entity_id: Option<String>,
    request_id: Option<String>,
    user: Option<String>,
    ip_address: Option<String>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl EventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            peer_entity_id: None,
            request_id: None,
            user: None,
            ip_address: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Sets the outcome to failure with an error message.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the peer entity ID.
    #[must_use]
    pub fn peer(mut self, entity_id: impl Into<String>) -> Self {
        self.peer_entity_id = Some(entity_id.into());
        self
    }

    /// Sets the request ID.
    #[must_use]
    pub fn request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Sets the authenticated user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the IP address.
    #[must_use]
    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> Event {
        Event {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            peer_entity_id: self.peer_entity_id,
            request_id: self.request_id,
            user: self.user,
            ip_address: self.ip_address,
            error: self.error,
            details: self.details,
        }
    }
}

/// Receiver of audit events.
///
/// Sinks are invoked synchronously on the request path and must not block.
pub trait EventSink: Send + Sync {
    /// Records an event.
    fn emit(&self, event: &Event);
}

/// Event sink that writes events to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &Event) {
        let peer = event.peer_entity_id.as_deref().unwrap_or("-");
        let request = event.request_id.as_deref().unwrap_or("-");
        match event.outcome {
            EventOutcome::Success => tracing::info!(
                event_type = ?event.event_type,
                peer,
                request,
                user = event.user.as_deref().unwrap_or("-"),
                "audit event"
            ),
            EventOutcome::Failure => tracing::warn!(
                event_type = ?event.event_type,
                peer,
                request,
                error = event.error.as_deref().unwrap_or("-"),
                "audit event"
            ),
        }
    }
}
