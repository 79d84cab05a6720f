//! Order lifecycle engine.
//!
//! [`OrderEngine`] implements the four order operations on top of an
//! [`OrderRepository`]. Raw request payloads are turned into typed
//! [`commands`] first, so validation always happens before any lookup.

pub mod commands;

use crate::error::OrderError;
use crate::repository::OrderRepository;
use crate::state::OrderStateMachine;
use commands::{AdvanceStatus, CreateOrder, GetStatus};
use courier_types::{NewOrder, Order, OrderId, OrderStatus};
use std::sync::Arc;

/// A decoded request body or query: keys mapped to untrusted values.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Entry point for every order operation.
#[derive(Clone)]
pub struct OrderEngine {
	repository: Arc<dyn OrderRepository>,
	state_machine: Arc<OrderStateMachine>,
}

impl OrderEngine {
	pub fn new(repository: Arc<dyn OrderRepository>, conflict_retries: u32) -> Self {
		let state_machine = Arc::new(OrderStateMachine::new(
			repository.clone(),
			conflict_retries,
		));
		Self {
			repository,
			state_machine,
		}
	}

	/// Creates a new, not yet active order and returns its id.
	pub async fn create_order(&self, payload: &Payload) -> Result<OrderId, OrderError> {
		let CreateOrder { destination, color } = CreateOrder::try_from(payload)?;

		let order = self
			.repository
			.create(NewOrder::pending(destination, color))
			.await?;

		tracing::info!(
			order_id = %order.id,
			destination = %order.destination,
			color = order.color,
			"Order created"
		);
		Ok(order.id)
	}

	/// Moves an order exactly one step along its status flow.
	pub async fn advance_status(&self, payload: &Payload) -> Result<Order, OrderError> {
		let AdvanceStatus { id, new_status } = AdvanceStatus::try_from(payload)?;
		let id = id.resolve()?;

		match self
			.state_machine
			.transition_order_status(id, new_status)
			.await
		{
			Ok(order) => {
				tracing::info!(order_id = %id, status = %order.status, "Order status advanced");
				Ok(order)
			},
			Err(e) => {
				tracing::debug!(order_id = %id, requested = %new_status, error = %e, "Status change rejected");
				Err(e)
			},
		}
	}

	/// Returns the current status of an order.
	pub async fn get_status(&self, payload: &Payload) -> Result<OrderStatus, OrderError> {
		let GetStatus { id } = GetStatus::try_from(payload)?;
		let order = self.state_machine.get_order(id.resolve()?).await?;
		Ok(order.status)
	}

	/// Returns the not yet active order with the smallest id, if any.
	pub async fn get_oldest_pending(&self) -> Result<Option<Order>, OrderError> {
		let oldest = self
			.repository
			.find_oldest_with_status(OrderStatus::NotActive)
			.await?;
		tracing::debug!(order_id = ?oldest.as_ref().map(|o| o.id.get()), "Oldest pending order looked up");
		Ok(oldest)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use crate::repository::StoredOrderRepository;
	use courier_storage::implementations::memory::MemoryStorage;
	use courier_storage::StorageService;
	use serde_json::{json, Value};

	fn engine() -> OrderEngine {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		OrderEngine::new(Arc::new(StoredOrderRepository::new(storage)), 8)
	}

	fn payload(value: Value) -> Payload {
		match value {
			Value::Object(map) => map,
			other => panic!("not an object: {}", other),
		}
	}

	async fn create(engine: &OrderEngine, destination: &str, color: u16) -> OrderId {
		engine
			.create_order(&payload(json!({"destination": destination, "color": color})))
			.await
			.unwrap()
	}

	async fn advance(engine: &OrderEngine, id: OrderId, status: u8) -> Result<Order, OrderError> {
		engine
			.advance_status(&payload(json!({"id": id.get(), "new_status": status})))
			.await
	}

	async fn status(engine: &OrderEngine, id: OrderId) -> OrderStatus {
		engine
			.get_status(&payload(json!({"id": id.get().to_string()})))
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn test_created_order_is_not_active() {
		let engine = engine();
		let id = create(&engine, "Bishan", 5).await;
		assert_eq!(status(&engine, id).await, OrderStatus::NotActive);

		let other = create(&engine, "Jurong", 5).await;
		assert_ne!(id, other);
	}

	#[tokio::test]
	async fn test_full_flow() {
		let engine = engine();
		let id = create(&engine, "Bishan", 5).await;

		advance(&engine, id, 1).await.unwrap();
		assert_eq!(status(&engine, id).await, OrderStatus::Active);

		advance(&engine, id, 2).await.unwrap();
		assert_eq!(status(&engine, id).await, OrderStatus::Completed);
	}

	#[tokio::test]
	async fn test_illegal_transitions() {
		let engine = engine();
		let id = create(&engine, "Bishan", 5).await;

		// skip
		let err = advance(&engine, id, 2).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::IllegalTransition);
		// no-op
		let err = advance(&engine, id, 0).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::IllegalTransition);

		advance(&engine, id, 1).await.unwrap();
		// decrease
		let err = advance(&engine, id, 0).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::IllegalTransition);

		advance(&engine, id, 2).await.unwrap();
		for target in 0..=2 {
			let err = advance(&engine, id, target).await.unwrap_err();
			assert!(matches!(err, OrderError::AlreadyComplete(_)), "target {}", target);
		}
		assert_eq!(status(&engine, id).await, OrderStatus::Completed);
	}

	#[tokio::test]
	async fn test_unknown_order() {
		let engine = engine();

		let err = engine
			.get_status(&payload(json!({"id": 42})))
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);

		let err = engine
			.advance_status(&payload(json!({"id": 99999, "new_status": 1})))
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::OrderNotFound(99999)));
	}

	#[tokio::test]
	async fn test_huge_ids_are_unknown_not_invalid() {
		let engine = engine();
		let huge = "123456789012345678901234567890";

		for id in [json!("40000"), json!(huge)] {
			let err = engine
				.get_status(&payload(json!({ "id": id.clone() })))
				.await
				.unwrap_err();
			assert_eq!(err.kind(), ErrorKind::NotFound, "id {}", id);

			let err = engine
				.advance_status(&payload(json!({ "id": id.clone(), "new_status": 1 })))
				.await
				.unwrap_err();
			assert_eq!(err.kind(), ErrorKind::NotFound, "id {}", id);
		}

		let err = engine
			.create_order(&payload(json!({"destination": "Bishan", "color": huge})))
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::InvalidColor));
	}

	#[tokio::test]
	async fn test_signed_or_padded_numbers_are_invalid() {
		let engine = engine();
		let id = create(&engine, "Bishan", 5).await;

		for raw in ["+1", " 1", "1 "] {
			let err = engine
				.get_status(&payload(json!({ "id": raw })))
				.await
				.unwrap_err();
			assert!(matches!(err, OrderError::InvalidId), "id {:?}", raw);

			let err = engine
				.create_order(&payload(json!({"destination": "Bishan", "color": raw})))
				.await
				.unwrap_err();
			assert!(matches!(err, OrderError::InvalidColor), "color {:?}", raw);
		}
		assert_eq!(status(&engine, id).await, OrderStatus::NotActive);
	}

	#[tokio::test]
	async fn test_validation_runs_before_lookup() {
		let engine = engine();
		let cases = [
			(json!({"id": 1}), ErrorKind::MissingField),
			(json!({"id": "1.5", "new_status": 1}), ErrorKind::InvalidValue),
			(json!({"id": 1, "new_status": 5}), ErrorKind::InvalidValue),
		];
		for (input, kind) in cases {
			let err = engine.advance_status(&payload(input)).await.unwrap_err();
			assert_eq!(err.kind(), kind);
		}
	}

	#[tokio::test]
	async fn test_oldest_pending() {
		let engine = engine();
		assert_eq!(engine.get_oldest_pending().await.unwrap(), None);

		let a = create(&engine, "A", 1).await;
		let b = create(&engine, "B", 2).await;
		let _c = create(&engine, "C", 3).await;

		let oldest = engine.get_oldest_pending().await.unwrap().unwrap();
		assert_eq!(oldest.id, a);
		assert_eq!(oldest.destination, "A");

		advance(&engine, a, 1).await.unwrap();
		let oldest = engine.get_oldest_pending().await.unwrap().unwrap();
		assert_eq!(oldest.id, b);
	}

	#[tokio::test]
	async fn test_oldest_pending_absent_when_all_started() {
		let engine = engine();
		let id = create(&engine, "Bishan", 0).await;
		advance(&engine, id, 1).await.unwrap();

		assert_eq!(engine.get_oldest_pending().await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_concurrent_advance_has_one_winner() {
		let engine = engine();
		let id = create(&engine, "Bishan", 5).await;

		let attempts = (0..8).map(|_| {
			let engine = engine.clone();
			tokio::spawn(async move { advance(&engine, id, 1).await })
		});
		let results: Vec<_> = futures::future::join_all(attempts)
			.await
			.into_iter()
			.map(|r| r.unwrap())
			.collect();

		let winners = results.iter().filter(|r| r.is_ok()).count();
		assert_eq!(winners, 1);
		for err in results.iter().filter_map(|r| r.as_ref().err()) {
			assert_eq!(err.kind(), ErrorKind::IllegalTransition);
		}
		assert_eq!(status(&engine, id).await, OrderStatus::Active);
	}
}
