use log::{error, warn, Level};
use serde_json::json;
use std::convert::Infallible;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectionError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl CollectionError {
    pub fn status(&self) -> StatusCode {
        match self {
            CollectionError::Unauthorized => StatusCode::UNAUTHORIZED,
            CollectionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CollectionError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Backend failures are ours; everything else is the caller's mistake.
    pub fn log_level(&self) -> Level {
        match self {
            CollectionError::StoreUnavailable(_) => Level::Error,
            CollectionError::Unauthorized | CollectionError::InvalidInput(_) => Level::Warn,
        }
    }
}

impl From<serde_json::Error> for CollectionError {
    fn from(e: serde_json::Error) -> Self {
        CollectionError::StoreUnavailable(format!("corrupt collection document: {}", e))
    }
}

impl Reject for CollectionError {}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Turns rejections into `{ "message": ... }` JSON bodies.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<CollectionError>() {
        match e {
            // Backend details stay in the log.
            CollectionError::StoreUnavailable(detail) => {
                error!("Store unavailable: {}", detail);
                (e.status(), "Server error".to_string())
            }
            _ => (e.status(), e.to_string()),
        }
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        warn!("Rejected malformed body: {}", e);
        (
            StatusCode::BAD_REQUEST,
            CollectionError::InvalidInput(e.to_string()).to_string(),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        // Checked before MethodNotAllowed: sibling routes add that rejection too.
        (StatusCode::LENGTH_REQUIRED, "Content-Length required".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected application/json".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "message": message })),
        status,
    ))
}
