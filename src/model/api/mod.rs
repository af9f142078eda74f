//! API-friendly types: request payloads, response bodies and request guards.
//!
//! IDs are exposed as plain hex strings and datetimes as RFC 3339.

pub mod auth;
pub mod credentials;
pub mod response;
pub mod survey;
