//! Request payload extraction.
//!
//! Handlers take a [`RequestPayload`]: the request's fields as a JSON map,
//! whatever encoding the client used. Query strings and form bodies yield
//! string values; JSON bodies keep their value types and must be objects.

use axum::{
	body::Bytes,
	extract::{FromRequest, Query, Request},
	http::{header::CONTENT_TYPE, Method, StatusCode},
	response::IntoResponse,
	Form, Json,
};
use courier_core::{OrderError, Payload};
use courier_types::APIError;
use serde_json::Value;
use std::collections::HashMap;

/// Decoded request fields.
#[derive(Debug, Clone, Default)]
pub struct RequestPayload(pub Payload);

fn malformed(message: impl std::fmt::Display) -> APIError {
	OrderError::MalformedInput(message.to_string()).into()
}

/// Maps a body extractor rejection, keeping oversized bodies apart from
/// undecodable ones.
fn rejected<R>(rejection: R) -> APIError
where
	R: IntoResponse + std::fmt::Display,
{
	let message = rejection.to_string();
	if rejection.into_response().status() == StatusCode::PAYLOAD_TOO_LARGE {
		tracing::debug!(error = %message, "Request body over the size limit");
		APIError::PayloadTooLarge {
			message: "Request body is too large".to_string(),
		}
	} else {
		malformed(message)
	}
}

fn from_strings(fields: HashMap<String, String>) -> Payload {
	fields
		.into_iter()
		.map(|(key, value)| (key, Value::String(value)))
		.collect()
}

impl<S> FromRequest<S> for RequestPayload
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		if req.method() == Method::GET || req.method() == Method::HEAD {
			let Query(fields) =
				Query::<HashMap<String, String>>::try_from_uri(req.uri()).map_err(malformed)?;
			return Ok(Self(from_strings(fields)));
		}

		let content_type = req
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.unwrap_or_default()
			.to_ascii_lowercase();

		if content_type.starts_with("application/json") {
			let Json(value) = Json::<Value>::from_request(req, state)
				.await
				.map_err(rejected)?;
			return match value {
				Value::Object(map) => Ok(Self(map)),
				_ => Err(malformed("Request body must be a JSON object")),
			};
		}

		if content_type.starts_with("application/x-www-form-urlencoded") {
			let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
				.await
				.map_err(rejected)?;
			return Ok(Self(from_strings(fields)));
		}

		let body = Bytes::from_request(req, state).await.map_err(rejected)?;
		if body.is_empty() {
			Ok(Self::default())
		} else {
			Err(malformed(format!(
				"Unsupported content type '{}'",
				content_type
			)))
		}
	}
}
