use crate::config::CorsPolicy;
use crate::db::Catalog;
use crate::error::PhotoError;
use crate::ingest::Ingestor;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use warp::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use warp::http::StatusCode;
use warp::{reject, Filter, Rejection, Reply};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(code: StatusCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug)]
pub struct DatabaseError {
    pub message: String,
}

impl reject::Reject for DatabaseError {}

#[derive(Debug)]
pub struct NotFoundError {
    pub message: String,
}

impl reject::Reject for NotFoundError {}

#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl reject::Reject for ValidationError {}

#[derive(Debug)]
pub struct PayloadTooLargeError {
    pub message: String,
}

impl reject::Reject for PayloadTooLargeError {}

#[derive(Debug)]
pub struct TooManyRequestsError {
    pub message: String,
    pub retry_after_secs: u64,
}

impl reject::Reject for TooManyRequestsError {}

pub fn not_found(message: impl Into<String>) -> Rejection {
    reject::custom(NotFoundError {
        message: message.into(),
    })
}

pub fn validation(message: impl Into<String>) -> Rejection {
    reject::custom(ValidationError {
        message: message.into(),
    })
}

/// Maps a domain error onto the rejection `handle_rejection` knows how to render.
pub fn reject_photo_error(err: PhotoError) -> Rejection {
    match err {
        PhotoError::Validation(message) => validation(message),
        PhotoError::PayloadTooLarge(message) => {
            reject::custom(PayloadTooLargeError { message })
        }
        PhotoError::NotFound(message) => not_found(message),
        PhotoError::Persistence(e) => {
            log::error!("Database error: {}", e);
            reject::custom(DatabaseError {
                message: format!("Database error: {}", e),
            })
        }
        PhotoError::Io(e) => {
            log::error!("I/O error: {}", e);
            reject::custom(DatabaseError {
                message: "Internal server error".to_string(),
            })
        }
    }
}

/// Path ids arrive as strings so a non-numeric id yields 400 instead of a route miss.
pub fn parse_photo_id(raw: &str) -> Result<i64, Rejection> {
    raw.parse::<i64>()
        .map_err(|_| validation(format!("Invalid photo id: {}", raw)))
}

pub fn with_catalog(
    catalog: Catalog,
) -> impl Filter<Extract = (Catalog,), Error = Infallible> + Clone {
    warp::any().map(move || catalog.clone())
}

pub fn with_ingestor(
    ingestor: Arc<Ingestor>,
) -> impl Filter<Extract = (Arc<Ingestor>,), Error = Infallible> + Clone {
    warp::any().map(move || ingestor.clone())
}

pub fn with_started_at(
    started_at: Instant,
) -> impl Filter<Extract = (Instant,), Error = Infallible> + Clone {
    warp::any().map(move || started_at)
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;
    let mut retry_after = None;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(database_error) = err.find::<DatabaseError>() {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = database_error.message.clone();
    } else if let Some(too_many) = err.find::<TooManyRequestsError>() {
        code = StatusCode::TOO_MANY_REQUESTS;
        message = too_many.message.clone();
        retry_after = Some(too_many.retry_after_secs);
    } else if let Some(not_found) = err.find::<NotFoundError>() {
        code = StatusCode::NOT_FOUND;
        message = not_found.message.clone();
    } else if let Some(validation_error) = err.find::<ValidationError>() {
        code = StatusCode::BAD_REQUEST;
        message = validation_error.message.clone();
    } else if let Some(too_large) = err.find::<PayloadTooLargeError>() {
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = too_large.message.clone();
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large".to_string();
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid query string".to_string();
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "Unsupported media type".to_string();
    } else if err.find::<warp::cors::CorsForbidden>().is_some() {
        code = StatusCode::FORBIDDEN;
        message = "Origin not allowed".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed".to_string();
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error".to_string();
    }

    let mut response = warp::reply::with_status(
        warp::reply::json(&ErrorResponse::new(code, message)),
        code,
    )
    .into_response();
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    Ok(response)
}

/// `None` when cross-origin access is switched off; no CORS headers are sent then.
pub fn cors(policy: &CorsPolicy) -> Option<warp::cors::Builder> {
    let builder = match policy {
        CorsPolicy::Disabled => return None,
        CorsPolicy::AnyOrigin => warp::cors().allow_any_origin(),
        CorsPolicy::Origins(origins) => {
            warp::cors().allow_origins(origins.iter().map(String::as_str))
        }
    };
    Some(
        builder
            .allow_credentials(true)
            .allow_headers(vec!["content-type", "authorization"])
            .allow_methods(vec!["GET", "POST", "DELETE", "OPTIONS"]),
    )
}

/// Hardening headers sent with every response.
pub fn security_headers() -> HeaderMap {
    const HEADERS: &[(&str, &str)] = &[
        (
            "content-security-policy",
            "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
             form-action 'self';frame-ancestors 'self';img-src 'self' data: blob:;\
             object-src 'none';script-src 'self';script-src-attr 'none';\
             style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
        ),
        ("cross-origin-opener-policy", "same-origin"),
        // Images are embedded by clients served from other origins
        ("cross-origin-resource-policy", "cross-origin"),
        ("origin-agent-cluster", "?1"),
        ("referrer-policy", "no-referrer"),
        ("strict-transport-security", "max-age=15552000; includeSubDomains"),
        ("x-content-type-options", "nosniff"),
        ("x-dns-prefetch-control", "off"),
        ("x-download-options", "noopen"),
        ("x-frame-options", "SAMEORIGIN"),
        ("x-permitted-cross-domain-policies", "none"),
        ("x-xss-protection", "0"),
    ];

    let mut headers = HeaderMap::new();
    for &(name, value) in HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}
