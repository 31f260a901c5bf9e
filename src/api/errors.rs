// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! API error taxonomy
//!
//! Three buckets: the client sent something unusable (400), the requested
//! record does not exist (404), or something broke server-side (500). Every
//! failure serializes as `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    /// Bad, missing, or undecodable input
    ValidationError(String),
    /// Unknown history id
    NotFound(String),
    /// Invariant violation or any other internal failure
    InternalError(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ValidationError(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::InternalError(_) => 500,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Messages go to clients verbatim; no type prefix
        match self {
            ApiError::ValidationError(msg)
            | ApiError::NotFound(msg)
            | ApiError::InternalError(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
