use rocket::{http::Status, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::mongodb::{Id, IdParam};

pub mod auth;
mod response;
mod survey;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(survey::routes());
    routes.extend(response::routes());
    routes
}

/// A JSON body as received by a route; parse failures are kept so they can become 400s.
type JsonBody<'r, T> = std::result::Result<Json<T>, rocket::serde::json::Error<'r>>;

/// Unwrap a JSON body, turning malformed or mistyped payloads into 400s.
fn json_body<T>(body: JsonBody<'_, T>) -> Result<T> {
    body.map(Json::into_inner)
        .map_err(|e| Error::bad_request(format!("Malformed request body: {e}")))
}

/// A malformed ID can never name a document, so it is simply not found.
fn resolve_id(id: IdParam, what: &str) -> Result<Id> {
    id.map_err(|_| Error::not_found(what.to_string()))
}

/// The error for a verb a route does not support.
fn method_not_allowed(method: &str, path: &str) -> Error {
    Error::Status(
        Status::MethodNotAllowed,
        format!("{method} is not supported on {path}"),
    )
}
