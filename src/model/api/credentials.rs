use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::db::user::NewUser;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw user credentials, received from a client. These are never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

impl TryFrom<UserCredentials> for NewUser {
    type Error = String;

    /// Convert [`UserCredentials`] to a new user by hashing the password.
    /// This enforces that the username is non-empty and the password meets minimum length.
    fn try_from(cred: UserCredentials) -> Result<Self, Self::Error> {
        if cred.username.trim().is_empty() {
            return Err("Username must not be empty".to_string());
        }
        if cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} bytes"
            ));
        }

        // 16 bytes of salt is the recommendation for Argon2.
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash = argon2::hash_encoded(cred.password.as_bytes(), &salt, &Config::default())
            .map_err(|e| format!("Failed to hash password: {e}"))?;
        Ok(Self {
            username: cred.username,
            password_hash,
        })
    }
}
