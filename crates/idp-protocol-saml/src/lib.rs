//! SAML 2.0 identity provider protocol engine.
//!
//! This crate takes an authentication request from a service provider and
//! answers it with a signed, optionally encrypted assertion, or with a
//! status response when the request cannot be honoured:
//!
//! - **Request validation** - signature, replay and freshness, assertion
//!   consumer service and encryption capability checks
//! - **Authentication** - requirement negotiation, SSO reuse, an upstream
//!   authenticator and post-authentication policy
//! - **Assertion issuance** - NameID generation, attribute release,
//!   assertion and response construction
//! - **Transport** - POST and Redirect bindings and Axum endpoints
//!
//! # Architecture
//!
//! - [`handler`] - orchestrates a request and decides failure policy
//! - [`validation`] - the ordered validation pipeline
//! - [`authn`] - requirements, identities, SSO and post-auth processors
//! - [`nameid`] - NameID generators and format negotiation
//! - [`attributes`] - attribute producers, voters and the release engine
//! - [`builder`] - assertion and response construction
//! - [`sender`] - binding encoding of finished responses
//! - [`metadata`] - the IdP's own metadata
//! - [`endpoints`] - Axum HTTP handlers
//! - [`types`], [`xml`], [`signature`], [`bindings`] - the SAML message layer
//! - [`error`] - error types
//!
//! # Example
//!
//! ```rust,ignore
//! use idp_protocol_saml::handler::{AuthnRequestHandler, Outcome};
//!
//! let handler = AuthnRequestHandler::builder(config, resolver, authenticator, signing_key)
//!     .name_id_secret(secret)
//!     .build()?;
//!
//! match handler.handle(raw_request).await {
//!     Outcome::Success { response, session } => { /* deliver, keep session */ }
//!     Outcome::ErrorResponse { response, .. } => { /* deliver */ }
//!     Outcome::LocalFault(fault) => { /* show an error page */ }
//! }
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Profiles](https://docs.oasis-open.org/security/saml/v2.0/saml-profiles-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attributes;
pub mod authn;
pub mod bindings;
pub mod builder;
pub mod endpoints;
pub mod error;
pub mod handler;
pub mod metadata;
pub mod nameid;
pub mod request;
pub mod resolver;
pub mod sender;
pub mod signature;
pub mod types;
pub mod validation;
pub mod xml;

pub use error::{IdpError, ProtocolError, SamlError, SamlResult, UnrecoverableError};
pub use handler::{AuthnRequestHandler, Outcome};
pub use types::*;
