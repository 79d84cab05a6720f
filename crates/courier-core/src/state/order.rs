//! Order state machine implementation.
//!
//! Orders move strictly one step at a time along
//! NotActive -> Active -> Completed. Completed is terminal. Transitions are
//! applied as conditional updates so that two concurrent requests can never
//! both move the same order out of the same status.

use crate::error::OrderError;
use crate::repository::{OrderRepository, OrderUpdate, UpdateOutcome};
use courier_types::{Order, OrderId, OrderStatus};
use std::sync::Arc;

/// Manages order status transitions and persistence.
pub struct OrderStateMachine {
	repository: Arc<dyn OrderRepository>,
	/// How many times a transition is re-evaluated after losing a race.
	conflict_retries: u32,
}

impl OrderStateMachine {
	pub fn new(repository: Arc<dyn OrderRepository>, conflict_retries: u32) -> Self {
		Self {
			repository,
			conflict_retries: conflict_retries.max(1),
		}
	}

	/// Gets an order by ID.
	pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderError> {
		self.repository
			.get(id)
			.await?
			.ok_or(OrderError::OrderNotFound(id.get().into()))
	}

	/// Checks that `requested` is the immediate successor of `current`.
	pub fn check_transition(
		id: OrderId,
		current: OrderStatus,
		requested: OrderStatus,
	) -> Result<(), OrderError> {
		if current.is_terminal() {
			return Err(OrderError::AlreadyComplete(id));
		}
		if current.next() != Some(requested) {
			return Err(OrderError::InvalidTransition {
				id,
				from: current,
				to: requested,
			});
		}
		Ok(())
	}

	/// Transitions an order to a new status with validation.
	///
	/// If another writer changes the order between the read and the write,
	/// the transition is re-validated against the status that won.
	pub async fn transition_order_status(
		&self,
		id: OrderId,
		requested: OrderStatus,
	) -> Result<Order, OrderError> {
		let mut current = self.get_order(id).await?;

		for attempt in 0..self.conflict_retries {
			Self::check_transition(id, current.status, requested)?;

			match self
				.repository
				.update(id, current.status, OrderUpdate::status(requested))
				.await?
			{
				UpdateOutcome::Applied(order) => return Ok(order),
				UpdateOutcome::Conflict(order) => {
					tracing::debug!(
						order_id = %id,
						attempt,
						status = %order.status,
						"Order changed concurrently, re-checking transition"
					);
					current = order;
				},
				UpdateOutcome::Missing => return Err(OrderError::OrderNotFound(id.get().into())),
			}
		}

		Err(OrderError::Storage(format!(
			"Gave up updating order {} after {} conflicting writes",
			id, self.conflict_retries
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::repository::MockOrderRepository;
	use courier_types::NewOrder;
	use mockall::predicate::eq;

	fn order(status: OrderStatus) -> Order {
		NewOrder {
			destination: "Bishan".into(),
			color: 5,
			status,
		}
		.with_id(OrderId::FIRST)
	}

	#[test]
	fn test_transition_table() {
		use OrderStatus::*;
		let id = OrderId::FIRST;

		let cases = [
			(NotActive, Active, true),
			(Active, Completed, true),
			(NotActive, NotActive, false),
			(NotActive, Completed, false),
			(Active, Active, false),
			(Active, NotActive, false),
		];
		for (from, to, allowed) in cases {
			assert_eq!(
				OrderStateMachine::check_transition(id, from, to).is_ok(),
				allowed,
				"{} -> {}",
				from,
				to
			);
		}

		for to in OrderStatus::FLOW {
			assert!(matches!(
				OrderStateMachine::check_transition(id, Completed, to),
				Err(OrderError::AlreadyComplete(_))
			));
		}
	}

	#[tokio::test]
	async fn test_transition_applies_update() {
		let mut repo = MockOrderRepository::new();
		repo.expect_get()
			.with(eq(OrderId::FIRST))
			.returning(|_| Ok(Some(order(OrderStatus::NotActive))));
		repo.expect_update()
			.with(
				eq(OrderId::FIRST),
				eq(OrderStatus::NotActive),
				eq(OrderUpdate::status(OrderStatus::Active)),
			)
			.times(1)
			.returning(|_, _, _| Ok(UpdateOutcome::Applied(order(OrderStatus::Active))));

		let machine = OrderStateMachine::new(Arc::new(repo), 8);
		let updated = machine
			.transition_order_status(OrderId::FIRST, OrderStatus::Active)
			.await
			.unwrap();
		assert_eq!(updated.status, OrderStatus::Active);
	}

	#[tokio::test]
	async fn test_rejected_transition_never_writes() {
		let mut repo = MockOrderRepository::new();
		repo.expect_get()
			.returning(|_| Ok(Some(order(OrderStatus::NotActive))));
		repo.expect_update().never();

		let machine = OrderStateMachine::new(Arc::new(repo), 8);
		let err = machine
			.transition_order_status(OrderId::FIRST, OrderStatus::Completed)
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::InvalidTransition { .. }));
	}

	#[tokio::test]
	async fn test_missing_order() {
		let mut repo = MockOrderRepository::new();
		repo.expect_get().returning(|_| Ok(None));

		let machine = OrderStateMachine::new(Arc::new(repo), 8);
		let err = machine
			.transition_order_status(OrderId::FIRST, OrderStatus::Active)
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::OrderNotFound(1)));
	}

	#[tokio::test]
	async fn test_lost_race_is_rechecked_against_winner() {
		let mut repo = MockOrderRepository::new();
		repo.expect_get()
			.returning(|_| Ok(Some(order(OrderStatus::NotActive))));
		// Someone else activated the order first.
		repo.expect_update()
			.times(1)
			.returning(|_, _, _| Ok(UpdateOutcome::Conflict(order(OrderStatus::Active))));

		let machine = OrderStateMachine::new(Arc::new(repo), 8);
		let err = machine
			.transition_order_status(OrderId::FIRST, OrderStatus::Active)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			OrderError::InvalidTransition {
				from: OrderStatus::Active,
				to: OrderStatus::Active,
				..
			}
		));
	}

	#[tokio::test]
	async fn test_gives_up_after_retries() {
		let mut repo = MockOrderRepository::new();
		repo.expect_get()
			.returning(|_| Ok(Some(order(OrderStatus::NotActive))));
		repo.expect_update()
			.times(3)
			.returning(|_, _, _| Ok(UpdateOutcome::Conflict(order(OrderStatus::NotActive))));

		let machine = OrderStateMachine::new(Arc::new(repo), 3);
		let err = machine
			.transition_order_status(OrderId::FIRST, OrderStatus::Active)
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::Storage(_)));
	}
}
