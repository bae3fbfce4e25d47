use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{self, FromRequest},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::model::db::Account;
use crate::model::mongodb::Id;
use crate::Config;

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific account with specific rights.
///
/// As a request guard, a missing cookie yields 401 (caught and redirected to
/// the login page), the wrong rights yield 403 (redirected to the landing
/// page), and a cookie that fails validation is rejected outright with 400.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    id: Id,
    #[serde(rename = "rgt")]
    rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Get the account ID.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Get the account's rights.
    pub fn rights(&self) -> Rights {
        self.rights
    }

    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl AuthToken<()> {
    /// Create a token for the given account, with rights derived from its role.
    /// The rights-agnostic `()` parameter is only used at login time; gated
    /// routes demand an `AuthToken<VoterUser>` or `AuthToken<AdminUser>`.
    pub fn for_account(account: &Account) -> Self {
        Self {
            id: account.id,
            rights: account.role.into(),
            phantom: PhantomData,
        }
    }
}

impl<U> AuthToken<U> {
    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .unwrap(); // Infallible.

        Cookie::build((AUTH_TOKEN_COOKIE, token))
            .max_age(time::Duration::seconds(config.auth_ttl().num_seconds()))
            .same_site(SameSite::Strict)
            .build()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User,
{
    type Error = ();

    /// Get an AuthToken from the cookie and verify that it has the correct
    /// rights for this user type.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        // Valid as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => return request::Outcome::Error((Status::Unauthorized, ())),
        };
        let token: Self = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(err) => {
                warn!("Rejecting invalid auth token: {err}");
                return request::Outcome::Error((Status::BadRequest, ()));
            }
        };

        if token.permits(U::RIGHTS) {
            request::Outcome::Success(token)
        } else {
            request::Outcome::Error((Status::Forbidden, ()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::{AccountCore, Role};

    fn config() -> Config {
        rocket::build()
            .figment()
            .extract::<Config>()
            .expect("test config")
    }

    #[test]
    fn cookie_round_trip() {
        let config = config();
        let account = Account {
            id: Id::new(),
            account: AccountCore::example_voter(),
        };
        assert_eq!(account.role, Role::Voter);

        let token = AuthToken::for_account(&account);
        let cookie = token.into_cookie(&config);

        let decoded = AuthToken::<()>::from_cookie(&cookie, &config).unwrap();
        assert_eq!(decoded.id(), account.id);
        assert!(decoded.permits(Rights::Voter));
        assert!(!decoded.permits(Rights::Admin));
    }

    #[test]
    fn tampered_cookie_is_rejected() {
        let config = config();
        let account = Account {
            id: Id::new(),
            account: AccountCore::example_admin(),
        };

        let cookie = AuthToken::for_account(&account).into_cookie(&config);
        let mut tampered = cookie.value().to_string();
        tampered.pop();
        let bad_cookie = Cookie::new(AUTH_TOKEN_COOKIE, tampered);

        assert!(AuthToken::<()>::from_cookie(&bad_cookie, &config).is_err());
    }
}
