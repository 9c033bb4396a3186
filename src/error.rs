use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("range not satisfiable for object of {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend timeout: {0}")]
    BackendTimeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct MediaError {
    pub error: &'static str,
    pub message: String,
}

impl Error {
    fn error_type(&self) -> &'static str {
        match self {
            Error::InvalidAddress(_) => "InvalidAddress",
            Error::UnsupportedScheme(_) => "UnsupportedScheme",
            Error::Forbidden(_) => "Forbidden",
            Error::AccessDenied(_) => "AccessDenied",
            Error::NotFound(_) => "NotFound",
            Error::RangeNotSatisfiable { .. } => "RangeNotSatisfiable",
            Error::BackendUnavailable(_) => "BackendUnavailable",
            Error::BackendTimeout(_) => "BackendTimeout",
            Error::Io(_) | Error::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedScheme(_) => StatusCode::BAD_REQUEST,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::AccessDenied(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Error::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
            Error::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // 416 carries no body bytes, only the unsatisfied-range marker
        if let Error::RangeNotSatisfiable { size } = self {
            let mut builder = Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_LENGTH, 0)
                .header(header::ACCEPT_RANGES, "bytes");
            if size > 0 {
                builder = builder.header(header::CONTENT_RANGE, format!("bytes */{size}"));
            }
            return builder.body(Body::empty()).unwrap();
        }

        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let body = MediaError {
            error: self.error_type(),
            message: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
