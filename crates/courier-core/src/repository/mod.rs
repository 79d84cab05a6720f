//! Persistence interface of the order lifecycle engine.
//!
//! The engine talks to storage only through [`OrderRepository`], which keeps
//! it independent of how and where orders are kept. [`StoredOrderRepository`]
//! implements it on top of the generic [`courier_storage::StorageService`].

mod stored;

pub use stored::StoredOrderRepository;

use async_trait::async_trait;
use courier_storage::StorageError;
use courier_types::{NewOrder, Order, OrderId, OrderStatus};

/// Changes applied to an existing order. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderUpdate {
	pub status: Option<OrderStatus>,
}

impl OrderUpdate {
	/// An update that only moves the status.
	pub fn status(status: OrderStatus) -> Self {
		Self {
			status: Some(status),
		}
	}

	pub fn apply(&self, order: &mut Order) {
		if let Some(status) = self.status {
			order.status = status;
		}
	}
}

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
	/// The update was persisted; carries the order as stored.
	Applied(Order),
	/// The order's status no longer matched the expected one, or another
	/// writer changed it concurrently. Carries the current order.
	Conflict(Order),
	/// No order with that id exists.
	Missing,
}

/// Storage operations the lifecycle engine needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
	/// Fetches an order by id.
	async fn get(&self, id: OrderId) -> Result<Option<Order>, StorageError>;

	/// Persists a new order under a freshly allocated id.
	async fn create(&self, fields: NewOrder) -> Result<Order, StorageError>;

	/// Applies `update` only if the order currently has `expected` status.
	///
	/// The check and the write are atomic with respect to other updates of
	/// the same order.
	async fn update(
		&self,
		id: OrderId,
		expected: OrderStatus,
		update: OrderUpdate,
	) -> Result<UpdateOutcome, StorageError>;

	/// Returns the order with the smallest id among those in `status`.
	async fn find_oldest_with_status(
		&self,
		status: OrderStatus,
	) -> Result<Option<Order>, StorageError>;
}
