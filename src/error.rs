use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Token invalid")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Voucher instance not found")]
    InstanceNotFound,

    #[error("Voucher already used")]
    AlreadyUsed,

    #[error("Voucher expired")]
    Expired,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::StorageUnavailable(err.to_string())
    }
}

impl AppError {
    /// Stable error code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::TokenInvalid => "TOKEN_INVALID",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            AppError::InstanceNotFound => "INSTANCE_NOT_FOUND",
            AppError::AlreadyUsed => "ALREADY_USED",
            AppError::Expired => "EXPIRED",
            AppError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            AppError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden => "FORBIDDEN",
            AppError::ReqwestError(_) => "EXTERNAL_API_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::TokenInvalid | AppError::TokenExpired | AppError::AuthError(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::AccountNotFound | AppError::InstanceNotFound | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::AlreadyUsed => StatusCode::CONFLICT,
            AppError::Expired => StatusCode::GONE,
            AppError::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ReqwestError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::StorageUnavailable(err) => {
                log::error!("Storage unavailable: {err}");
                "Storage unavailable, please retry".to_string()
            }
            AppError::ConfigError(_)
            | AppError::InternalError(_)
            | AppError::SerdeJsonError(_)
            | AppError::ReqwestError(_) => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                msg.clone()
            }
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                "Forbidden".to_string()
            }
            AppError::ValidationError(msg) | AppError::NotFound(msg) => msg.clone(),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_client_errors() {
        for err in [
            AppError::TokenInvalid,
            AppError::TokenExpired,
            AppError::AccountNotFound,
            AppError::InstanceNotFound,
            AppError::AlreadyUsed,
            AppError::Expired,
            AppError::InsufficientBalance,
        ] {
            assert!(err.status_code().is_client_error(), "{err}");
        }
        assert_eq!(
            AppError::StorageUnavailable("timeout".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_db_errors_become_storage_unavailable() {
        let err: AppError = DbErr::Custom("connection reset".into()).into();
        assert_eq!(err.code(), "STORAGE_UNAVAILABLE");
    }
}
