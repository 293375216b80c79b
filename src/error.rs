//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the store and the
//! identity subsystem, along with a mapper to HTTP-equivalent status codes
//! for whatever frontend renders the results.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    #[error("{code}: {message}")]
    Validation { code: String, message: String },
    #[error("{code}: {message}")]
    NotFound { code: String, message: String },
    #[error("{code}: {message}")]
    InvalidCredentials { code: String, message: String },
    #[error("{code}: {message}")]
    InsufficientPermissions { code: String, message: String },
    #[error("{code}: {message}")]
    InvalidToken { code: String, message: String },
    #[error("{code}: {message}")]
    Storage { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::InvalidCredentials { code, .. }
            | AppError::InsufficientPermissions { code, .. }
            | AppError::InvalidToken { code, .. }
            | AppError::Storage { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::InvalidCredentials { message, .. }
            | AppError::InsufficientPermissions { message, .. }
            | AppError::InvalidToken { message, .. }
            | AppError::Storage { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn invalid_credentials<S: Into<String>>(code: S, msg: S) -> Self { AppError::InvalidCredentials { code: code.into(), message: msg.into() } }
    pub fn insufficient_permissions<S: Into<String>>(code: S, msg: S) -> Self { AppError::InsufficientPermissions { code: code.into(), message: msg.into() } }
    pub fn invalid_token<S: Into<String>>(code: S, msg: S) -> Self { AppError::InvalidToken { code: code.into(), message: msg.into() } }
    pub fn storage<S: Into<String>>(code: S, msg: S) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::InvalidCredentials { .. } => 401,
            AppError::InvalidToken { .. } => 401,
            AppError::InsufficientPermissions { .. } => 403,
            AppError::Storage { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage { code: "io_error".into(), message: err.to_string() }
    }
}
