//! Order endpoints.
//!
//! Each function runs one engine operation and shapes its result into the
//! response envelope. Error mapping to HTTP happens in the server.

use courier_core::{OrderEngine, OrderError, Payload};
use courier_types::{ApiResponse, Order};
use serde_json::json;

/// Projection of an order as returned to clients.
fn order_data(order: &Order) -> serde_json::Value {
	json!({
		"id": order.id.get(),
		"destination": order.destination,
		"color": order.color,
		"status": order.status.as_u8(),
	})
}

/// POST /orders/new
pub async fn create_order(engine: &OrderEngine, payload: &Payload) -> Result<ApiResponse, OrderError> {
	let id = engine.create_order(payload).await?;
	Ok(ApiResponse::ok(json!({ "id": id.get() })))
}

/// POST /orders/update
pub async fn update_order(engine: &OrderEngine, payload: &Payload) -> Result<ApiResponse, OrderError> {
	engine.advance_status(payload).await?;
	Ok(ApiResponse::ok(json!({})))
}

/// GET or POST /orders/status
pub async fn order_status(engine: &OrderEngine, payload: &Payload) -> Result<ApiResponse, OrderError> {
	let status = engine.get_status(payload).await?;
	Ok(ApiResponse::ok(json!({ "status": status.as_u8() })))
}

/// GET /orders/uncompleted
///
/// Without a pending order the envelope carries no `data` at all.
pub async fn oldest_pending(engine: &OrderEngine) -> Result<ApiResponse, OrderError> {
	Ok(match engine.get_oldest_pending().await? {
		Some(order) => ApiResponse::ok(order_data(&order)),
		None => ApiResponse::empty(),
	})
}
