//! State management for orders.
//!
//! This module provides the state machine that validates and applies order
//! status transitions on top of an [`crate::repository::OrderRepository`].

pub mod order;

pub use order::OrderStateMachine;
