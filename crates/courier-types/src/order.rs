//! Order types for the courier system.
//!
//! An order is a delivery request with a destination, a color tag and a
//! status that moves through a fixed flow: not active, active, completed.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest value accepted for ids and colors (16-bit signed range).
pub const MAX_SMALL_INT: u16 = i16::MAX as u16;

/// Errors raised when an integer cannot be turned into an order value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValueError {
	#[error("Status {0} is not one of 0 (not active), 1 (active), 2 (completed)")]
	UnknownStatus(u64),
	#[error("Value {value} exceeds the maximum of {max}")]
	OutOfRange { value: u64, max: u16 },
}

/// Store-assigned identifier of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u16")]
pub struct OrderId(u16);

impl OrderId {
	/// The first id handed out by an empty store.
	pub const FIRST: OrderId = OrderId(1);

	/// Returns the numeric value of the id.
	pub fn get(self) -> u16 {
		self.0
	}

	/// Returns the id following this one, or `None` once the range is used up.
	pub fn next(self) -> Option<OrderId> {
		if self.0 >= MAX_SMALL_INT {
			None
		} else {
			Some(OrderId(self.0 + 1))
		}
	}
}

impl TryFrom<u64> for OrderId {
	type Error = OrderValueError;

	fn try_from(value: u64) -> Result<Self, Self::Error> {
		match u16::try_from(value) {
			Ok(v) if v <= MAX_SMALL_INT => Ok(OrderId(v)),
			_ => Err(OrderValueError::OutOfRange {
				value,
				max: MAX_SMALL_INT,
			}),
		}
	}
}

impl From<OrderId> for u16 {
	fn from(id: OrderId) -> Self {
		id.0
	}
}

impl fmt::Display for OrderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Lifecycle status of an order.
///
/// Discriminants follow the flow order and are what gets stored and sent
/// over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u8")]
pub enum OrderStatus {
	NotActive = 0,
	Active = 1,
	Completed = 2,
}

impl OrderStatus {
	/// All statuses in flow order.
	pub const FLOW: [OrderStatus; 3] = [
		OrderStatus::NotActive,
		OrderStatus::Active,
		OrderStatus::Completed,
	];

	/// Returns the status an order moves to from this one, if any.
	pub fn next(self) -> Option<OrderStatus> {
		match self {
			OrderStatus::NotActive => Some(OrderStatus::Active),
			OrderStatus::Active => Some(OrderStatus::Completed),
			OrderStatus::Completed => None,
		}
	}

	/// Whether no further transition is possible.
	pub fn is_terminal(self) -> bool {
		self.next().is_none()
	}

	/// Wire value of the status.
	pub fn as_u8(self) -> u8 {
		self as u8
	}
}

impl TryFrom<u64> for OrderStatus {
	type Error = OrderValueError;

	fn try_from(value: u64) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(OrderStatus::NotActive),
			1 => Ok(OrderStatus::Active),
			2 => Ok(OrderStatus::Completed),
			other => Err(OrderValueError::UnknownStatus(other)),
		}
	}
}

impl From<OrderStatus> for u8 {
	fn from(status: OrderStatus) -> Self {
		status.as_u8()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			OrderStatus::NotActive => "not active",
			OrderStatus::Active => "active",
			OrderStatus::Completed => "completed",
		};
		write!(f, "{}", name)
	}
}

/// A delivery order as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier assigned on creation.
	pub id: OrderId,
	/// Free-form location name, e.g. a train station.
	pub destination: String,
	/// External sorting/tagging code in `[0, 32767]`.
	pub color: u16,
	/// Current lifecycle status.
	pub status: OrderStatus,
}

/// Fields supplied when creating an order; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
	pub destination: String,
	pub color: u16,
	pub status: OrderStatus,
}

impl NewOrder {
	/// Builds the fields of a freshly created, not yet active order.
	pub fn pending(destination: impl Into<String>, color: u16) -> Self {
		Self {
			destination: destination.into(),
			color,
			status: OrderStatus::NotActive,
		}
	}

	/// Attaches the store-assigned id.
	pub fn with_id(self, id: OrderId) -> Order {
		Order {
			id,
			destination: self.destination,
			color: self.color,
			status: self.status,
		}
	}
}
