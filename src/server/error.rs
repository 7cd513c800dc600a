//! Error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::AutisenseError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Autisense(#[from] AutisenseError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Autisense(e) if e.is_contract_violation() => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(detail = %self, "Internal server error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unknown = ServerError::from(AutisenseError::UnknownCategory {
            field: "Sex".to_string(),
            value: "x".to_string(),
        });
        assert_eq!(unknown.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let io = ServerError::from(AutisenseError::InferenceError("boom".to_string()));
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(ServerError::BadRequest("x".to_string()).status(), StatusCode::BAD_REQUEST);
    }
}
