use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::order::{ErrorClass, OrderError};

/// Uniform error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
}

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self.classification() {
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Forbidden => StatusCode::FORBIDDEN,
            ErrorClass::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        if self.classification() == ErrorClass::Internal {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        HttpResponse::build(status).json(ErrorResponse {
            code: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
            timestamp: Utc::now(),
        })
    }
}
