use rocket::{response::Redirect, Catcher, Route};

mod admin;
mod context;
mod public;
mod voting;

pub use context::PageContext;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes.extend(admin::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![unauthenticated, forbidden]
}

/// No session: back to the login form.
#[catch(401)]
fn unauthenticated() -> Redirect {
    Redirect::to(uri!("/login"))
}

/// Wrong role: back to the landing page.
#[catch(403)]
fn forbidden() -> Redirect {
    Redirect::to(uri!("/"))
}
