//! Common types for the courier order tracking system.
//!
//! This crate holds the data types shared by every other courier crate: the
//! order entity and its status flow, the HTTP response envelope, storage
//! namespaces, and the validation helpers applied to untrusted input and to
//! backend configuration.

/// API types for the HTTP response envelope and error mapping.
pub mod api;
/// The order entity, its identifier and its lifecycle status.
pub mod order;
/// Registry trait for named, config-selected implementations.
pub mod registry;
/// Storage namespaces for persisted records.
pub mod storage;
/// Input predicates and configuration schema validation.
pub mod validation;

pub use api::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use validation::*;
