use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use mongodb::{bson::ser::Error as BsonError, error::Error as DbError};
use rocket::{http::Status, response::Responder, Request};
use thiserror::Error;

use crate::logging::RequestId;
use crate::model::mongodb::is_transient_transaction_error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Bson(#[from] BsonError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Construct a 404 error for the described resource.
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    pub fn bad_request(reason: String) -> Self {
        Self::Status(Status::BadRequest, reason)
    }

    pub fn unauthorized(reason: String) -> Self {
        Self::Status(Status::Unauthorized, reason)
    }

    /// Whether this is a database error that clears up if the transaction is re-run.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Db(err) if is_transient_transaction_error(err))
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let id = req.local_cache(RequestId::next);
        Err(match self {
            Self::Status(status, msg) => {
                warn!("  req{id} {msg}");
                status
            }
            Self::Jwt(err) => {
                warn!("  req{id} {err}");
                match err.into_kind() {
                    JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                        Status::Unauthorized
                    }
                    _ => Status::BadRequest,
                }
            }
            Self::Db(err) => {
                error!("  req{id} Database error: {err}");
                Status::InternalServerError
            }
            Self::Bson(err) => {
                error!("  req{id} BSON serialization error: {err}");
                Status::InternalServerError
            }
        })
    }
}
