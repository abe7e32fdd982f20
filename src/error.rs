// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{forms::FieldErrors, routes::LOGIN_PATH, store::StoreError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} does not exist")]
    NotFound(&'static str),

    #[error("You didn't select a choice.")]
    InvalidSelection,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid form submission")]
    Validation(FieldErrors),

    #[error("Question has no choices")]
    NoChoices,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("Export failed: {0}")]
    Export(#[from] csv::Error),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidSelection | AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationRequired => {
                return Redirect::to(LOGIN_PATH).into_response();
            }
            AppError::Validation(errors) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "errors": errors })),
                )
                    .into_response();
            }
            AppError::NoChoices => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Chart(_) | AppError::Export(_) | AppError::Storage(_) => {
                error!("{self}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
