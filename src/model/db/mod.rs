//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod response;
pub mod survey;
pub mod user;

pub use response::{NewSurveyResponse, SurveyResponse};
pub use survey::{NewSurvey, Survey};
pub use user::{NewUser, User};
