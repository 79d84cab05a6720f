//! Order lifecycle core for the courier system.
//!
//! Validates client input, enforces the order status flow and persists
//! orders through a repository. The HTTP service is a thin layer over
//! [`OrderEngine`].

pub mod builder;
pub mod engine;
pub mod error;
pub mod repository;
pub mod state;

pub use builder::{BuilderError, CourierBuilder};
pub use engine::{OrderEngine, Payload};
pub use error::{ErrorKind, OrderError};
pub use repository::{OrderRepository, OrderUpdate, StoredOrderRepository, UpdateOutcome};
pub use state::OrderStateMachine;
