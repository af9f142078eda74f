#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;
use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Assemble the server: routes, logging, config and database connection.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
}

/// Assemble a server against an already-connected database.
#[cfg(test)]
pub(crate) async fn rocket_for_db(db_client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = db_client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .manage(db_client)
        .manage(db)
}

/// Connect to the database named by the `db_uri` config value.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// A random database name, so tests never collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}
