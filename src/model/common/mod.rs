//! Types shared verbatim between the database and the API.

pub mod survey;
