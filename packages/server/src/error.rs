use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde::Serialize;

use crate::middleware::request_id::RequestId;

/// Application-level error type mapped onto the wire envelope
/// `{"error": {"code", "message", "request_id"}}`.
#[derive(Debug)]
pub enum ApiError {
    InvalidRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    RateLimited,
    Internal(String),
}

/// Wire shape of an error response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    #[schema(example = "invalid_request")]
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// An [`ApiError`] carrying the id of the request it occurred on.
#[derive(Debug)]
pub struct RequestError {
    pub error: ApiError,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::InvalidRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg) => msg.clone(),
            ApiError::RateLimited => "rate limit exceeded".to_string(),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                "an unexpected error occurred".to_string()
            }
        }
    }

    pub fn with_request_id(self, request_id: &RequestId) -> RequestError {
        RequestError {
            error: self,
            request_id: Some(request_id.0.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        RequestError {
            error: self,
            request_id: None,
        }
        .into_response()
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error.code(),
                message: self.error.message(),
                request_id: self.request_id,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<queue::QueueError> for ApiError {
    fn from(err: queue::QueueError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ApiError> for RequestError {
    fn from(error: ApiError) -> Self {
        RequestError {
            error,
            request_id: None,
        }
    }
}

/// Attaches the request id to any error convertible into [`ApiError`], so
/// handlers can write `query().await.rid(&request_id)?`.
pub trait WithRequestId<T> {
    fn rid(self, request_id: &RequestId) -> Result<T, RequestError>;
}

impl<T, E: Into<ApiError>> WithRequestId<T> for Result<T, E> {
    fn rid(self, request_id: &RequestId) -> Result<T, RequestError> {
        self.map_err(|e| e.into().with_request_id(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_statuses() {
        let cases = [
            (ApiError::InvalidRequest("x".into()), 400, "invalid_request"),
            (ApiError::Unauthorized("x".into()), 401, "unauthorized"),
            (ApiError::Forbidden("x".into()), 403, "forbidden"),
            (ApiError::NotFound("x".into()), 404, "not_found"),
            (ApiError::RateLimited, 429, "rate_limited"),
            (ApiError::Internal("x".into()), 500, "internal_error"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code().as_u16(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_internal_detail_is_not_leaked() {
        let err = ApiError::Internal("connection to 10.0.0.5 refused".into());
        assert_eq!(err.message(), "an unexpected error occurred");
    }
}
