//! Error type shared by the report service and the HTTP handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub const DATA_NOT_FOUND: &str = "Data not found";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The query ran but matched no rows.
    #[error("{0}")]
    NotFound(String),

    /// A caller-supplied value could not be parsed.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn not_found() -> Self {
        Self::NotFound(DATA_NOT_FOUND.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Database(e) = &self {
            tracing::error!("warehouse query failed: {}", e);
        }
        (status, Json(ErrorResponse { detail: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::not_found().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::BadRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_detail() {
        assert_eq!(ApiError::not_found().to_string(), "Data not found");
    }

    #[tokio::test]
    async fn test_error_body_uses_detail_field() {
        let response = ApiError::BadRequest("Invalid date format. Use YYYY-MM-DD.".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Invalid date format. Use YYYY-MM-DD.");
    }
}
