// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Duplicate transaction reference: {0}")]
    DuplicateReference(String),

    #[error("Unknown transaction reference: {0}")]
    UnknownReference(String),

    #[error("Donation not found")]
    DonationNotFound,

    #[error("Campaign not found")]
    CampaignNotFound,

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("Paystack error: {0}")]
    PaystackError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("External API error: {0}")]
    ExternalApi(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string()),
            AppError::DuplicateReference(_) => (StatusCode::CONFLICT, "Duplicate reference".to_string()),
            AppError::UnknownReference(_) => (StatusCode::NOT_FOUND, "Unknown reference".to_string()),
            AppError::DonationNotFound => (StatusCode::NOT_FOUND, "Donation not found".to_string()),
            AppError::CampaignNotFound => (StatusCode::NOT_FOUND, "Campaign not found".to_string()),
            AppError::InvalidObjectId(_) => (StatusCode::BAD_REQUEST, "Invalid ID format".to_string()),
            AppError::PaystackError(_) => (StatusCode::BAD_GATEWAY, "Paystack error".to_string()),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::ExternalApi(_) => (StatusCode::BAD_GATEWAY, "External API error".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

// Manual From implementations
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(format!("HTTP request failed: {}", err))
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn paystack(msg: impl Into<String>) -> Self {
        AppError::PaystackError(msg.into())
    }

    /// True when the underlying mongodb error is a unique-index violation
    /// (E11000), which the donation store maps to `DuplicateReference`.
    pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
        use mongodb::error::{ErrorKind, WriteFailure};
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == 11000,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
