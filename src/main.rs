use log::{error, info};
use rocket::Error as RocketError;
use thiserror::Error;

/// Errors that are critical to the entire server.
#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Rocket(#[from] RocketError),
}

async fn run() -> Result<(), Error> {
    info!("Configuring server...");
    let rocket = survey_backend::build().ignite().await?;
    info!("...server configured!");
    let _ = rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    log4rs::init_file("log4rs.yaml", Default::default())
        .expect("Failed to initialise logging");
    info!("Initialised logging");

    if let Err(err) = run().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
