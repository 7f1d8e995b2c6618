use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

// Propagated untouched up to the router, which renders it once.
#[derive(Debug, Error)]
pub enum Error {
    // Unknown route and missing credentials look the same to the caller
    #[error("Not Found.")]
    RoutingMiss,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    UpstreamNotFound(String),

    #[error("{reason}")]
    Upstream { reason: String, status: u16 },
}

impl Error {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::UpstreamNotFound(reason.into())
    }

    pub fn upstream(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::Upstream {
            reason: reason.into(),
            status: status.unwrap_or(500),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::RoutingMiss | Self::UpstreamNotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn reason(&self) -> String {
        self.to_string()
    }
}
