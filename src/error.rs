use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("configuration could not be loaded: {0}")]
    Load(#[from] config::ConfigError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Validation(String),

    #[error("login required")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type DeskResult<T> = Result<T, DeskError>;

impl DeskError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeskError::Validation(_) => StatusCode::BAD_REQUEST,
            DeskError::Unauthorized => StatusCode::UNAUTHORIZED,
            DeskError::NotFound(_) => StatusCode::NOT_FOUND,
            DeskError::Http(_) | DeskError::Status { .. } | DeskError::Upstream(_) => {
                StatusCode::BAD_GATEWAY
            }
            DeskError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "success": false,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
