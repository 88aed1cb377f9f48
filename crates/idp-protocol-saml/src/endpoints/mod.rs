//! HTTP transport for the SSO service.
//!
//! - `GET /saml/sso` - HTTP-Redirect binding
//! - `POST /saml/sso` - HTTP-POST binding
//! - `GET /saml/metadata` - the IdP `EntityDescriptor`
//!
//! The endpoints only move bytes: they turn an HTTP request into a
//! [`RawAuthnRequest`](crate::request::RawAuthnRequest), hand it to the
//! [`AuthnRequestHandler`](crate::handler::AuthnRequestHandler) and deliver
//! the outcome. SSO sessions are kept behind an opaque cookie.
//!
//! # Example
//!
//! ```rust,ignore
//! use idp_protocol_saml::endpoints::{saml_router, SamlState};
//!
//! let app = saml_router().with_state(SamlState::new(handler, metadata, sessions));
//! ```

mod metadata;
mod router;
mod sso;
mod state;

pub use metadata::*;
pub use router::*;
pub use sso::*;
pub use state::*;
