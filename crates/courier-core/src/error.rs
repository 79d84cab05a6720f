//! Errors reported by the order lifecycle engine.

use courier_storage::StorageError;
use courier_types::{APIError, OrderId, OrderStatus};
use thiserror::Error;

/// Classification of an [`OrderError`], used to pick the HTTP status and
/// the machine-readable error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	MalformedInput,
	MissingField,
	InvalidValue,
	NotFound,
	IllegalTransition,
	/// The store failed; not the client's fault.
	Infrastructure,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::MalformedInput => "MALFORMED_INPUT",
			ErrorKind::MissingField => "MISSING_FIELD",
			ErrorKind::InvalidValue => "INVALID_VALUE",
			ErrorKind::NotFound => "NOT_FOUND",
			ErrorKind::IllegalTransition => "ILLEGAL_TRANSITION",
			ErrorKind::Infrastructure => "INTERNAL_ERROR",
		}
	}

	/// Whether the client can fix the request to make it succeed.
	pub fn is_client_error(&self) -> bool {
		!matches!(self, ErrorKind::Infrastructure)
	}
}

/// Errors that can occur while handling an order operation.
#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Malformed request: {0}")]
	MalformedInput(String),
	#[error("Missing {}", .0.join(" or "))]
	MissingField(Vec<&'static str>),
	#[error("The destination is not a non-empty string")]
	InvalidDestination,
	#[error("The color is not a non-negative integer up to 32767")]
	InvalidColor,
	#[error("The id is not a non-negative integer")]
	InvalidId,
	#[error("The new status is not one of 0, 1 or 2")]
	InvalidStatus,
	#[error("Order {0} does not exist")]
	OrderNotFound(u64),
	#[error("Order {0} is already completed")]
	AlreadyComplete(OrderId),
	#[error("Order {id} cannot move from {from} to {to}")]
	InvalidTransition {
		id: OrderId,
		from: OrderStatus,
		to: OrderStatus,
	},
	#[error("Storage error: {0}")]
	Storage(String),
}

impl OrderError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			OrderError::MalformedInput(_) => ErrorKind::MalformedInput,
			OrderError::MissingField(_) => ErrorKind::MissingField,
			OrderError::InvalidDestination
			| OrderError::InvalidColor
			| OrderError::InvalidId
			| OrderError::InvalidStatus => ErrorKind::InvalidValue,
			OrderError::OrderNotFound(_) => ErrorKind::NotFound,
			OrderError::AlreadyComplete(_) | OrderError::InvalidTransition { .. } => {
				ErrorKind::IllegalTransition
			},
			OrderError::Storage(_) => ErrorKind::Infrastructure,
		}
	}
}

impl From<StorageError> for OrderError {
	fn from(err: StorageError) -> Self {
		OrderError::Storage(err.to_string())
	}
}

impl From<OrderError> for APIError {
	fn from(err: OrderError) -> Self {
		if err.kind().is_client_error() {
			APIError::BadRequest {
				message: err.to_string(),
			}
		} else {
			// Store details are logged by the caller, not sent to clients.
			APIError::InternalServerError {
				message: "Internal server error".to_string(),
			}
		}
	}
}
