use rocket::{http::Status, response::Responder};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure-level errors that can abort a request.
///
/// Domain failures of the voting engine live in [`crate::voting::VoteError`];
/// handlers translate those into flash messages instead of error responses.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Argon2(#[from] argon2::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        error!("{self}");
        Err(match self {
            Self::Db(_) | Self::Argon2(_) | Self::Io(_) => Status::InternalServerError,
            // An unparseable or expired token is rejected outright; the
            // 401/403 catchers only see missing-session and wrong-role cases.
            Self::Jwt(_) => Status::BadRequest,
            Self::Status(status, _) => status,
        })
    }
}
