//! End-to-end scenario tests.
//!
//! Each test builds a complete IdP with freshly generated keys and drives
//! it with requests signed the way a service provider would sign them.

mod common;
mod issuance;
mod name_ids;
mod replay;
