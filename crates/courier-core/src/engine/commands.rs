//! Typed inputs of the order operations.
//!
//! Each command is built from a decoded request [`Payload`] and carries
//! values that already passed validation, so the engine never sees raw
//! transport data.

use super::Payload;
use crate::error::OrderError;
use courier_types::{
	has_required_keys, parse_non_negative_integer, OrderId, OrderStatus, MAX_SMALL_INT,
};
use serde_json::Value;

/// Fields of a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrder {
	pub destination: String,
	pub color: u16,
}

/// Request to move an order to `new_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceStatus {
	pub id: OrderRef,
	pub new_status: OrderStatus,
}

/// Request for the status of one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetStatus {
	pub id: OrderRef,
}

/// A syntactically valid order id as supplied by a client.
///
/// Ids outside the store's range are valid input that simply never
/// resolves to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRef(u64);

impl OrderRef {
	pub fn new(raw: u64) -> Self {
		Self(raw)
	}

	pub fn raw(self) -> u64 {
		self.0
	}

	/// Resolves to a store id, or `OrderNotFound` if none can exist.
	pub fn resolve(self) -> Result<OrderId, OrderError> {
		OrderId::try_from(self.0).map_err(|_| OrderError::OrderNotFound(self.0))
	}
}

fn require(payload: &Payload, keys: &[&'static str]) -> Result<(), OrderError> {
	if has_required_keys(keys, payload) {
		Ok(())
	} else {
		Err(OrderError::MissingField(keys.to_vec()))
	}
}

static NULL: Value = Value::Null;

/// Looks up a key that `require` already checked.
fn field<'a>(payload: &'a Payload, key: &str) -> &'a Value {
	payload.get(key).unwrap_or(&NULL)
}

fn order_ref(value: &Value) -> Result<OrderRef, OrderError> {
	parse_non_negative_integer(value, true)
		.map(OrderRef)
		.ok_or(OrderError::InvalidId)
}

impl TryFrom<&Payload> for CreateOrder {
	type Error = OrderError;

	fn try_from(payload: &Payload) -> Result<Self, Self::Error> {
		require(payload, &["destination", "color"])?;

		let destination = match field(payload, "destination") {
			Value::String(s) if !s.trim().is_empty() => s.clone(),
			_ => return Err(OrderError::InvalidDestination),
		};

		let color = parse_non_negative_integer(field(payload, "color"), true)
			.filter(|c| *c <= u64::from(MAX_SMALL_INT))
			.and_then(|c| u16::try_from(c).ok())
			.ok_or(OrderError::InvalidColor)?;

		Ok(Self { destination, color })
	}
}

impl TryFrom<&Payload> for AdvanceStatus {
	type Error = OrderError;

	fn try_from(payload: &Payload) -> Result<Self, Self::Error> {
		require(payload, &["id", "new_status"])?;

		let id = order_ref(field(payload, "id"))?;
		let new_status = parse_non_negative_integer(field(payload, "new_status"), true)
			.and_then(|s| OrderStatus::try_from(s).ok())
			.ok_or(OrderError::InvalidStatus)?;

		Ok(Self { id, new_status })
	}
}

impl TryFrom<&Payload> for GetStatus {
	type Error = OrderError;

	fn try_from(payload: &Payload) -> Result<Self, Self::Error> {
		require(payload, &["id"])?;
		Ok(Self {
			id: order_ref(field(payload, "id"))?,
		})
	}
}
