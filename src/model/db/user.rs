use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub username: String,
    pub password_hash: String,
}

impl UserCore {
    /// Check whether the given password is correct.
    /// A malformed stored hash never verifies.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::api::credentials::UserCredentials;

    #[test]
    fn verify_password() {
        let user = NewUser::example();
        assert!(user.verify_password(UserCredentials::example().password));
        assert!(!user.verify_password(UserCredentials::example2().password));
        assert!(!user.verify_password(""));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let user = NewUser {
            username: "broken".to_string(),
            password_hash: "not a hash".to_string(),
        };
        assert!(!user.verify_password("anything"));
    }
}
