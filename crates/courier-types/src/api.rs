//! API types for the courier HTTP API.
//!
//! Every endpoint answers with the same envelope: a `success` flag, a
//! human-readable `message` (empty on success) and an optional `data`
//! payload. `data` is left out of the JSON entirely when an operation has
//! nothing to return, so "no data" is distinguishable from a zero value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Response envelope shared by all endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
	/// Whether the operation succeeded.
	pub success: bool,
	/// Human-readable description; empty on success.
	#[serde(default)]
	pub message: String,
	/// Operation payload, omitted when there is none.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl ApiResponse {
	/// A successful response carrying `data`.
	pub fn ok(data: Value) -> Self {
		Self {
			success: true,
			message: String::new(),
			data: Some(data),
		}
	}

	/// A successful response without a payload.
	pub fn empty() -> Self {
		Self {
			success: true,
			message: String::new(),
			data: None,
		}
	}

	/// A failed response with the given message.
	pub fn failure(message: impl Into<String>) -> Self {
		Self {
			success: false,
			message: message.into(),
			data: None,
		}
	}
}

/// API error type with HTTP status mapping.
///
/// Business and validation failures are client errors; anything the store
/// reports is an internal error whose details stay in the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum APIError {
	/// Malformed body, missing or invalid field, unknown order, or an
	/// illegal transition (400).
	BadRequest { message: String },
	/// Request body above the configured size limit (413).
	PayloadTooLarge { message: String },
	/// Infrastructure failure (500).
	InternalServerError { message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::PayloadTooLarge { .. } => 413,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to the response envelope for JSON serialization.
	pub fn to_response(&self) -> ApiResponse {
		match self {
			APIError::BadRequest { message }
			| APIError::PayloadTooLarge { message }
			| APIError::InternalServerError { message } => ApiResponse::failure(message.clone()),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message } => write!(f, "Bad Request: {}", message),
			APIError::PayloadTooLarge { message } => write!(f, "Payload Too Large: {}", message),
			APIError::InternalServerError { message } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		(status, Json(self.to_response())).into_response()
	}
}
