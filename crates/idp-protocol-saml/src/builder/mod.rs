//! Assertion and response construction.
//!
//! [`AssertionBuilder`] turns an authenticated identity into an assertion
//! for one request. [`ResponseFactory`] wraps it (or an error status) into
//! the response that goes back to the peer.

mod assertion;
mod response;

pub use assertion::{AssertionBuilder, AssertionCustomizer, AssertionInput};
pub use response::{FinishedResponse, ResponseCustomizer, ResponseFactory, ResponseTarget};

use crate::error::IdpError;

/// Converts a policy offset into a signed duration.
fn offset(duration: std::time::Duration, what: &str) -> Result<chrono::Duration, IdpError> {
    chrono::Duration::from_std(duration)
        .map_err(|e| IdpError::internal(format!("{what} out of range: {e}")))
}
