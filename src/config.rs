use chrono::Duration;
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::model::mongodb::ensure_indexes_exist;

/// Database holding users, surveys and responses.
const DATABASE_NAME: &str = "surveys";

/// Settings read from `Rocket.toml` or `ROCKET_*` variables, managed by Rocket
/// so that auth routes and guards can sign and check session cookies.
#[derive(Deserialize)]
pub struct Config {
    /// Seconds a login stays valid.
    auth_ttl: u32,
    /// Key for signing session JWTs. Must be overridden outside development.
    jwt_secret: String,
}

impl Config {
    /// How long an auth cookie and its token remain valid after login.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// Pull `T` out of Rocket's figment, reporting what is missing or malformed.
fn extract<T: DeserializeOwned>(rocket: &Rocket<Build>, what: &str) -> Option<T> {
    match rocket.figment().extract::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Invalid {what} config");
            rocket::config::pretty_print_error(e);
            None
        }
    }
}

/// Aborts ignition unless [`Config`] can be loaded; otherwise manages it.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Survey config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        match extract::<Config>(&rocket, "auth") {
            Some(config) => Ok(rocket.manage(config)),
            None => Err(rocket),
        }
    }
}

#[derive(Deserialize)]
struct DbConfig {
    /// MongoDB connection string; transactions need a replica set.
    db_uri: String,
}

/// Connects to MongoDB at `db_uri` and manages both the `Client` (for
/// transactions) and the survey `Database` (for [`Coll`](crate::model::mongodb::Coll) guards).
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "Survey database",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = extract::<DbConfig>(&rocket, "database") else {
            return Err(rocket);
        };

        info!("Connecting to the survey database...");
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Could not connect to the survey database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE_NAME);

        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Could not create survey database indexes: {e}");
            return Err(rocket);
        }
        info!("...connected to database `{DATABASE_NAME}`");

        Ok(rocket.manage(client).manage(db))
    }
}
