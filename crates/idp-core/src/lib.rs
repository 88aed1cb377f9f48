//! # idp-core
//!
//! Core configuration, error handling, and audit events for the SAML identity
//! provider.
//!
//! This crate provides foundational types shared by the protocol engine and
//! its storage backends.
//!
//! ## Contents
//!
//! - [`config`] - Identity provider policy settings
//! - [`error`] - Core error type
//! - [`event`] - Audit events and event sinks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;

pub use config::IdpConfig;
pub use error::{Error, Result};
pub use event::{Event, EventBuilder, EventOutcome, EventSink, EventType, TracingEventSink};
