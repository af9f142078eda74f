mod bson;
mod collection;
mod errors;

pub use bson::{hex_id, Id, IdParam};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::{commit_with_retry, is_duplicate_key_error, is_transient_transaction_error};
