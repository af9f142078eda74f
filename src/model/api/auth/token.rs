use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    db::user::User,
    mongodb::{hex_id, Coll, Id},
};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token naming the logged-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "sub", with = "hex_id")]
    pub id: Id,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given user.
    pub fn new(user: &User) -> Self {
        Self { id: user.id }
    }

    /// Sign this token into a session cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build((AUTH_TOKEN_COOKIE, token))
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .build())
    }

    /// Verify and decode a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and check the user still exists.
    ///
    /// Every failure to authenticate is a 401, never a forward.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => {
                return Outcome::Error((
                    Status::Unauthorized,
                    Error::unauthorized("No auth token".to_string()),
                ))
            }
        };

        let token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => return Outcome::Error((Status::Unauthorized, e)),
        };

        // Check the user actually exists.
        let users = req.guard::<Coll<User>>().await.unwrap();
        match users.find_one(token.id.as_doc(), None).await {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => Outcome::Error((
                Status::Unauthorized,
                Error::unauthorized(format!("User {} no longer exists", token.id)),
            )),
            Err(e) => Outcome::Error((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::local::asynchronous::Client;

    use super::*;

    #[backend_test]
    async fn cookie_round_trip(client: Client) {
        let config = client.rocket().state::<Config>().unwrap();
        let token = AuthToken { id: Id::new() };

        let cookie = token.into_cookie(config).unwrap();
        assert_eq!(cookie.name(), AUTH_TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));

        let decoded = AuthToken::from_cookie(&cookie, config).unwrap();
        assert_eq!(decoded, token);
    }

    #[backend_test]
    async fn tampered_cookie_is_rejected(client: Client) {
        let config = client.rocket().state::<Config>().unwrap();
        let cookie = AuthToken { id: Id::new() }.into_cookie(config).unwrap();

        let tampered = Cookie::new(AUTH_TOKEN_COOKIE, format!("{}x", cookie.value()));
        assert!(AuthToken::from_cookie(&tampered, config).is_err());
    }
}
