use mongodb::bson::doc;
use rocket::{
    form::Form,
    http::CookieJar,
    request::FlashMessage,
    response::{Flash, Redirect},
    Route, State,
};
use rocket_dyn_templates::{context, Template};

use crate::error::Result;
use crate::model::{
    auth::{AdminUser, AuthToken, VoterUser, AUTH_TOKEN_COOKIE},
    db::{Account, Role, Setting},
    mongodb::Coll,
};
use crate::Config;

use super::PageContext;

pub fn routes() -> Vec<Route> {
    routes![index, login_page, login, logout]
}

/// Responses that either render a page or send the browser elsewhere.
#[derive(Responder)]
pub enum PageOrRedirect {
    Page(Template),
    Redirect(Redirect),
}

#[get("/")]
async fn index(settings: Coll<Setting>, flash: Option<FlashMessage<'_>>) -> Result<Template> {
    let ctx = PageContext::load(&settings, flash).await?;
    Ok(Template::render("index", context! { ctx }))
}

#[get("/login")]
async fn login_page(
    voter: Option<AuthToken<VoterUser>>,
    admin: Option<AuthToken<AdminUser>>,
    settings: Coll<Setting>,
    flash: Option<FlashMessage<'_>>,
) -> Result<PageOrRedirect> {
    // Already signed in: skip the form.
    if admin.is_some() {
        return Ok(PageOrRedirect::Redirect(Redirect::to(uri!("/admin"))));
    }
    if voter.is_some() {
        return Ok(PageOrRedirect::Redirect(Redirect::to(uri!("/voting"))));
    }

    let ctx = PageContext::load(&settings, flash).await?;
    Ok(PageOrRedirect::Page(Template::render(
        "auth/login",
        context! { ctx },
    )))
}

#[derive(FromForm)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Responder)]
enum LoginResult {
    Success(Redirect),
    Failure(Flash<Redirect>),
}

#[post("/login", data = "<form>")]
async fn login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    accounts: Coll<Account>,
    config: &State<Config>,
) -> Result<LoginResult> {
    let with_username = doc! {
        "username": form.username.to_lowercase(),
    };
    let account = accounts
        .find_one(with_username, None)
        .await?
        .filter(|account| account.verify_password(&form.password));

    let account = match account {
        Some(account) => account,
        None => {
            return Ok(LoginResult::Failure(Flash::error(
                Redirect::to(uri!("/login")),
                "username atau password salah",
            )));
        }
    };

    let token = AuthToken::for_account(&account);
    cookies.add(token.into_cookie(config));

    let destination = match account.role {
        Role::Admin => uri!("/admin"),
        Role::Voter => uri!("/voting"),
    };
    Ok(LoginResult::Success(Redirect::to(destination)))
}

#[post("/logout")]
fn logout(cookies: &CookieJar<'_>) -> Redirect {
    cookies.remove(AUTH_TOKEN_COOKIE);
    Redirect::to(uri!("/"))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;

    #[backend_test]
    async fn bad_credentials_are_rejected(client: Client) {
        let response = client
            .post("/login")
            .header(ContentType::Form)
            .body("username=admin&password=wrong")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/login"));
    }

    #[backend_test(admin)]
    async fn admin_login_reaches_the_dashboard(client: Client) {
        let response = client.get("/admin").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[backend_test]
    async fn guests_are_redirected_to_login(client: Client) {
        let response = client.get("/admin").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/login"));
    }

    #[backend_test(voter)]
    async fn voters_cannot_reach_admin_pages(client: Client) {
        let response = client.get("/admin").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/"));
    }

    #[backend_test(voter)]
    async fn logout_clears_the_session(client: Client) {
        let response = client.post("/logout").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);

        let response = client.get("/voting").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/login"));
    }
}
