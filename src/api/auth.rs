use mongodb::bson::doc;
use rocket::{http::CookieJar, http::Status, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, AUTH_TOKEN_COOKIE},
            credentials::UserCredentials,
        },
        db::user::{NewUser, User},
        mongodb::{is_duplicate_key_error, Coll},
    },
    Config,
};

use super::{json_body, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![register, login, logout]
}

#[post("/api/auth/register", data = "<credentials>")]
pub async fn register(
    credentials: JsonBody<'_, UserCredentials>,
    new_users: Coll<NewUser>,
) -> Result<Status> {
    let credentials = json_body(credentials)?;
    let username = credentials.username.clone();
    let user = NewUser::try_from(credentials).map_err(Error::bad_request)?;

    match new_users.insert_one(&user, None).await {
        Ok(_) => Ok(Status::Created),
        Err(e) if is_duplicate_key_error(&e) => Err(Error::bad_request(format!(
            "Username already in use: {username}"
        ))),
        Err(e) => Err(e.into()),
    }
}

#[post("/api/auth/login", data = "<credentials>")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: JsonBody<'_, UserCredentials>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Status> {
    let credentials = json_body(credentials)?;
    let with_username = doc! {
        "username": &credentials.username,
    };

    let user = users
        .find_one(with_username, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::unauthorized(
                "No user found with the provided username and password combination.".to_string(),
            )
        })?;

    cookies.add(AuthToken::new(&user).into_cookie(config)?);

    Ok(Status::Ok)
}

#[delete("/api/auth")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(AUTH_TOKEN_COOKIE);
    Status::Ok
}
