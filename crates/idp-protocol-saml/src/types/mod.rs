//! SAML 2.0 types and data structures.
//!
//! This module contains the core SAML types used for authentication,
//! including requests, responses, assertions, peer metadata, and related
//! structures.

mod assertion;
mod authn_request;
mod constants;
mod metadata;
mod name_id;
mod response;
mod status;

pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
pub use metadata::*;
pub use name_id::*;
pub use response::*;
pub use status::*;
