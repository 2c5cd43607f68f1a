use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match &error {
            ApplicationError::Domain(domain_err) => match domain_err {
                DomainError::Unauthenticated => {
                    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", error.to_string())
                }
                DomainError::Forbidden { .. } => {
                    ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", error.to_string())
                }
                DomainError::NotFound { .. } => {
                    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", error.to_string())
                }
                DomainError::InvalidArgument { .. } => {
                    ApiError::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", error.to_string())
                }
                DomainError::Conflict { .. } => {
                    ApiError::new(StatusCode::CONFLICT, "CONFLICT", error.to_string())
                }
            },
            ApplicationError::Collaborator(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "COLLABORATOR_UNAVAILABLE",
                error.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
