use super::{OrderRepository, OrderUpdate, UpdateOutcome};
use async_trait::async_trait;
use courier_storage::{StorageError, StorageService};
use courier_types::{NewOrder, Order, OrderId, OrderStatus, StorageKey};
use std::sync::Arc;

/// Name of the sequence holding the last allocated order id.
const ORDER_SEQUENCE: &str = "orders";

/// Upper bound on compare-and-swap rounds for a single id allocation.
/// Every lost round means another request allocated an id, so this is only
/// reached under pathological contention.
const MAX_ALLOCATION_ROUNDS: usize = 1024;

/// [`OrderRepository`] backed by a [`StorageService`].
///
/// Orders live under `orders:<id>`; the id sequence under
/// `sequences:orders`. Every write is a compare-and-swap so concurrent
/// requests never share an id or overwrite each other's transition.
pub struct StoredOrderRepository {
	storage: Arc<StorageService>,
}

impl StoredOrderRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Reserves the next order id.
	async fn allocate_id(&self) -> Result<OrderId, StorageError> {
		for _ in 0..MAX_ALLOCATION_ROUNDS {
			let last = self
				.storage
				.retrieve_versioned::<OrderId>(StorageKey::Sequences, ORDER_SEQUENCE)
				.await?;

			let (candidate, reserved) = match last {
				None => {
					let first = OrderId::FIRST;
					let reserved = self
						.storage
						.insert_new(StorageKey::Sequences, ORDER_SEQUENCE, &first)
						.await?;
					(first, reserved)
				},
				Some(last) => {
					let next = last.value.next().ok_or_else(|| {
						StorageError::Backend(format!(
							"Order id space exhausted after id {}",
							last.value
						))
					})?;
					let reserved = self
						.storage
						.replace(StorageKey::Sequences, ORDER_SEQUENCE, &last, &next)
						.await?;
					(next, reserved)
				},
			};

			if reserved {
				return Ok(candidate);
			}
		}

		Err(StorageError::Backend(
			"Could not allocate an order id under contention".into(),
		))
	}
}

#[async_trait]
impl OrderRepository for StoredOrderRepository {
	async fn get(&self, id: OrderId) -> Result<Option<Order>, StorageError> {
		Ok(self
			.storage
			.retrieve_versioned::<Order>(StorageKey::Orders, &id.to_string())
			.await?
			.map(|versioned| versioned.into_inner()))
	}

	async fn create(&self, fields: NewOrder) -> Result<Order, StorageError> {
		loop {
			let id = self.allocate_id().await?;
			let order = fields.clone().with_id(id);

			if self
				.storage
				.insert_new(StorageKey::Orders, &id.to_string(), &order)
				.await?
			{
				return Ok(order);
			}

			// Only happens if records were written behind the sequence's back;
			// the sequence moves on, so this terminates.
			tracing::warn!(order_id = %id, "Allocated id already in use, allocating another");
		}
	}

	async fn update(
		&self,
		id: OrderId,
		expected: OrderStatus,
		update: OrderUpdate,
	) -> Result<UpdateOutcome, StorageError> {
		let key = id.to_string();
		let Some(current) = self
			.storage
			.retrieve_versioned::<Order>(StorageKey::Orders, &key)
			.await?
		else {
			return Ok(UpdateOutcome::Missing);
		};

		if current.value.status != expected {
			return Ok(UpdateOutcome::Conflict(current.into_inner()));
		}

		let mut updated = current.value.clone();
		update.apply(&mut updated);

		if self
			.storage
			.replace(StorageKey::Orders, &key, &current, &updated)
			.await?
		{
			return Ok(UpdateOutcome::Applied(updated));
		}

		// Lost the race: report what is stored now.
		match self.get(id).await? {
			Some(order) => Ok(UpdateOutcome::Conflict(order)),
			None => Ok(UpdateOutcome::Missing),
		}
	}

	async fn find_oldest_with_status(
		&self,
		status: OrderStatus,
	) -> Result<Option<Order>, StorageError> {
		// Keys sort lexically ("10" < "9"), so compare the parsed ids.
		let orders: Vec<(String, Order)> = self.storage.scan(StorageKey::Orders).await?;
		Ok(orders
			.into_iter()
			.map(|(_, order)| order)
			.filter(|order| order.status == status)
			.min_by_key(|order| order.id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use courier_storage::implementations::file::FileStorage;
	use courier_storage::implementations::memory::MemoryStorage;
	use courier_storage::StorageInterface;

	fn repository_on(backend: Box<dyn StorageInterface>) -> StoredOrderRepository {
		StoredOrderRepository::new(Arc::new(StorageService::new(backend)))
	}

	fn memory_repository() -> StoredOrderRepository {
		repository_on(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_create_assigns_increasing_ids() {
		let repo = memory_repository();

		let a = repo.create(NewOrder::pending("Bishan", 5)).await.unwrap();
		let b = repo.create(NewOrder::pending("Jurong", 6)).await.unwrap();

		assert_eq!(a.id.get(), 1);
		assert_eq!(b.id.get(), 2);
		assert_eq!(a.status, OrderStatus::NotActive);
		assert_eq!(repo.get(a.id).await.unwrap(), Some(a));
	}

	#[tokio::test]
	async fn test_get_missing() {
		let repo = memory_repository();
		assert_eq!(repo.get(OrderId::FIRST).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_update_checks_expected_status() {
		let repo = memory_repository();
		let order = repo.create(NewOrder::pending("Bishan", 5)).await.unwrap();

		let outcome = repo
			.update(order.id, OrderStatus::Active, OrderUpdate::status(OrderStatus::Completed))
			.await
			.unwrap();
		assert_eq!(outcome, UpdateOutcome::Conflict(order.clone()));

		let outcome = repo
			.update(order.id, OrderStatus::NotActive, OrderUpdate::status(OrderStatus::Active))
			.await
			.unwrap();
		let UpdateOutcome::Applied(updated) = outcome else {
			panic!("expected update to apply, got {:?}", outcome);
		};
		assert_eq!(updated.status, OrderStatus::Active);
		assert_eq!(updated.destination, "Bishan");
		assert_eq!(repo.get(order.id).await.unwrap(), Some(updated));
	}

	#[tokio::test]
	async fn test_update_missing_order() {
		let repo = memory_repository();
		let outcome = repo
			.update(OrderId::FIRST, OrderStatus::NotActive, OrderUpdate::default())
			.await
			.unwrap();
		assert_eq!(outcome, UpdateOutcome::Missing);
	}

	#[tokio::test]
	async fn test_oldest_with_status_compares_numerically() {
		let repo = memory_repository();
		let mut ids = Vec::new();
		for i in 0..12u16 {
			ids.push(repo.create(NewOrder::pending(format!("stop-{}", i), i)).await.unwrap().id);
		}

		// Take ids 1..=9 out of the pending set; 10 must win over "2".."9".
		for id in &ids[..9] {
			repo.update(*id, OrderStatus::NotActive, OrderUpdate::status(OrderStatus::Active))
				.await
				.unwrap();
		}

		let oldest = repo
			.find_oldest_with_status(OrderStatus::NotActive)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(oldest.id.get(), 10);

		let oldest_active = repo
			.find_oldest_with_status(OrderStatus::Active)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(oldest_active.id.get(), 1);

		assert_eq!(
			repo.find_oldest_with_status(OrderStatus::Completed).await.unwrap(),
			None
		);
	}

	#[tokio::test]
	async fn test_concurrent_creates_get_distinct_ids() {
		let repo = Arc::new(memory_repository());
		let creates = (0..32u16).map(|i| {
			let repo = Arc::clone(&repo);
			tokio::spawn(async move { repo.create(NewOrder::pending("Bishan", i)).await.unwrap().id })
		});

		let mut ids: Vec<u16> = futures::future::join_all(creates)
			.await
			.into_iter()
			.map(|r| r.unwrap().get())
			.collect();
		ids.sort_unstable();
		assert_eq!(ids, (1..=32).collect::<Vec<u16>>());
	}

	#[tokio::test]
	async fn test_id_space_exhaustion() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let last = OrderId::try_from(32767u64).unwrap();
		assert!(storage
			.insert_new(StorageKey::Sequences, ORDER_SEQUENCE, &last)
			.await
			.unwrap());

		let repo = StoredOrderRepository::new(storage);
		let err = repo.create(NewOrder::pending("Bishan", 1)).await.unwrap_err();
		assert!(err.to_string().contains("exhausted"));
	}

	#[tokio::test]
	async fn test_file_backend_round_trip() {
		let dir = tempfile::TempDir::new().unwrap();
		let repo = repository_on(Box::new(FileStorage::new(dir.path().to_path_buf())));

		let order = repo.create(NewOrder::pending("Bishan", 5)).await.unwrap();
		repo.update(order.id, OrderStatus::NotActive, OrderUpdate::status(OrderStatus::Active))
			.await
			.unwrap();

		let reopened = repository_on(Box::new(FileStorage::new(dir.path().to_path_buf())));
		let stored = reopened.get(order.id).await.unwrap().unwrap();
		assert_eq!(stored.status, OrderStatus::Active);

		let next = reopened.create(NewOrder::pending("Jurong", 1)).await.unwrap();
		assert_eq!(next.id.get(), 2);
	}
}
