use crate::forum::ForumError;
use crate::storage::StorageError;
use crate::user::AccountError;
use crate::votes::VoteError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

pub const SIGN_IN_PATH: &str = "/auth/signin";

/// Every error a handler can return, already reduced to what the client sees.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    Validation {
        field: &'static str,
        message: String,
    },
    InvalidCredentials,
    NotFound(String),
    Conflict {
        message: String,
        retryable: bool,
    },
    Unavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn persistence(err: &dyn std::fmt::Display) -> Self {
        error!("Persistence failure: {}", err);
        ApiError::Unavailable("storage is temporarily unavailable".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Unauthenticated => json!({
                "error": "unauthenticated",
                "redirect": SIGN_IN_PATH,
            }),
            ApiError::Validation { field, message } => json!({
                "error": "validation",
                "field": field,
                "message": message,
            }),
            ApiError::InvalidCredentials => json!({
                "error": "invalid_credentials",
            }),
            ApiError::NotFound(message) => json!({
                "error": "not_found",
                "message": message,
            }),
            ApiError::Conflict { message, retryable } => json!({
                "error": "conflict",
                "message": message,
                "retryable": retryable,
            }),
            ApiError::Unavailable(message) => json!({
                "error": "unavailable",
                "message": message,
                "retryable": true,
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<VoteError> for ApiError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::Unauthenticated => ApiError::Unauthenticated,
            VoteError::TargetNotFound(_) => ApiError::NotFound(err.to_string()),
            VoteError::Conflict(_) => ApiError::Conflict {
                message: err.to_string(),
                retryable: true,
            },
            VoteError::Persistence { .. } => ApiError::persistence(&err),
        }
    }
}

impl From<ForumError> for ApiError {
    fn from(err: ForumError) -> Self {
        match err {
            ForumError::Validation { field, message } => ApiError::Validation { field, message },
            ForumError::CategoryNotFound(_)
            | ForumError::ThreadNotFound(_)
            | ForumError::ReplyNotFound(_) => ApiError::NotFound(err.to_string()),
            ForumError::Persistence(inner) => ApiError::persistence(&format!("{:#}", inner)),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation { field, message } => ApiError::Validation { field, message },
            AccountError::Conflict(_) => ApiError::Conflict {
                message: err.to_string(),
                retryable: false,
            },
            AccountError::InvalidCredentials => ApiError::InvalidCredentials,
            AccountError::NotFound(_) => ApiError::NotFound(err.to_string()),
            AccountError::Persistence(inner) => ApiError::persistence(&format!("{:#}", inner)),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ContentTypeNotAllowed(_) | StorageError::TooLarge { .. } => {
                ApiError::Validation {
                    field: "file",
                    message: err.to_string(),
                }
            }
            StorageError::InvalidKey(_) | StorageError::Io(_) => ApiError::persistence(&err),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::persistence(&format!("{:#}", err))
    }
}
