//! The mongodb crate doesn't provide error code constants, so we keep the
//! ones we need here.

use log::debug;
use mongodb::{
    error::{
        Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
        UNKNOWN_TRANSACTION_COMMIT_RESULT,
    },
    ClientSession,
};

pub const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given error is a duplicate key write error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
    )
}

/// Return true if the whole transaction can be run again from the start,
/// e.g. after a write conflict with a concurrent transaction.
pub fn is_transient_transaction_error(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
}

/// Commit the session's transaction, retrying while the outcome is unknown.
pub async fn commit_with_retry(session: &mut ClientSession) -> Result<(), DbError> {
    loop {
        match session.commit_transaction().await {
            Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                debug!("Commit result unknown, retrying: {e}");
            }
            result => return result,
        }
    }
}
