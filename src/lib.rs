#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod voting;

pub use config::Config;

/// Assemble the server: routes, catchers, and the fairing stack.
/// `ConfigFairing` must precede `DatabaseFairing`, which bootstraps the
/// admin account from config.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(Template::fairing())
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(logging::LoggerFairing)
}

/// Test setup: launch a local client against a fresh randomly-named
/// database and hand back both. Used by the `#[backend_test]` macro.
#[cfg(test)]
pub(crate) async fn test_client_and_db() -> (rocket::local::asynchronous::Client, mongodb::Database)
{
    let client = rocket::local::asynchronous::Client::tracked(build())
        .await
        .expect("failed to ignite test rocket");
    let db = client
        .rocket()
        .state::<mongodb::Database>()
        .expect("database not managed")
        .clone();
    (client, db)
}
