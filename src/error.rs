//! Error types for the lifeline server.
//!
//! Every variant renders as the SCREAMING_SNAKE code that is sent back to the
//! client as the plain-text response body.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // === Request validation ===
    #[error("INVALID_ID")]
    InvalidId,
    #[error("INVALID_LOCATION")]
    InvalidLocation,
    #[error("INVALID_EMAIL")]
    InvalidEmail,
    #[error("INVALID_PASSWORD")]
    InvalidPassword,
    #[error("INVALID_NAME")]
    InvalidName,
    #[error("INVALID_MIME")]
    InvalidMime,
    #[error("INVALID_STATUS_TRANSITION")]
    InvalidStatusTransition,
    #[error("INVALID_LIMIT")]
    InvalidLimit,
    #[error("{0}_MUST_HAVE_{1}")]
    MissingField(&'static str, &'static str),

    // === Authentication ===
    #[error("UNAUTHORIZED")]
    Unauthorized,
    #[error("INVALID_COMBINATION")]
    InvalidCombination,
    #[error("INVALID_TOKEN")]
    InvalidToken,

    // === Lookups ===
    #[error("{0}_NOT_FOUND")]
    NotFound(&'static str),
    #[error("{0}_ALREADY_EXIST")]
    AlreadyExist(&'static str),

    // === Storage ===
    #[error("DATABASE_UNAVAILABLE")]
    DatabaseUnavailable,
    #[error("QUERY_FAILED")]
    QueryFailed,
    #[error("INSERTING_FAILED")]
    InsertingFailed,
    #[error("UPDATE_FAILED")]
    UpdateFailed,
    #[error("HASHING_FAILED")]
    HashingFailed,
    #[error("GENERATING_FAILED")]
    GeneratingFailed,
    #[error("FILE_STORAGE_FAILED")]
    FileStorageFailed,

    // === Configuration ===
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidId
            | Self::InvalidLocation
            | Self::InvalidEmail
            | Self::InvalidPassword
            | Self::InvalidName
            | Self::InvalidMime
            | Self::InvalidStatusTransition
            | Self::InvalidLimit
            | Self::MissingField(..) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::InvalidCombination | Self::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExist(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidId.to_string(), "INVALID_ID");
        assert_eq!(Error::NotFound("ACCIDENT").to_string(), "ACCIDENT_NOT_FOUND");
        assert_eq!(
            Error::AlreadyExist("VOLUNTEER").to_string(),
            "VOLUNTEER_ALREADY_EXIST"
        );
        assert_eq!(
            Error::MissingField("VOLUNTEER", "USERNAME").to_string(),
            "VOLUNTEER_MUST_HAVE_USERNAME"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::InvalidLocation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::InvalidCombination.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Error::NotFound("HOSPITAL").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::AlreadyExist("HOSPITAL").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::QueryFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_error_response_body_is_code() {
        let response = Error::InvalidStatusTransition.error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body.as_ref(), b"INVALID_STATUS_TRANSITION");
    }

    #[test]
    fn test_invalid_limit_is_client_error() {
        assert_eq!(Error::InvalidLimit.to_string(), "INVALID_LIMIT");
        assert_eq!(Error::InvalidLimit.status_code(), StatusCode::BAD_REQUEST);
    }
}
