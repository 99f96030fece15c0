use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use log::{ error, warn };
use thiserror::Error;

use super::json::JsonRequestError;
use crate::llm::response::InvalidResponse;
use crate::llm::GatewayError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    BadRequest(#[from] JsonRequestError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    InvalidResponse(#[from] InvalidResponse),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(_) | ApiError::InvalidResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::BadRequest(e) => warn!("Rejected request: {}", e),
            ApiError::Gateway(e) => error!("Model call failed: {}", e),
            ApiError::InvalidResponse(e) => error!("{}", e),
        }
        (status, self.to_string()).into_response()
    }
}
