//! Validation for everything that enters the system from outside.
//!
//! [`input`] checks values decoded from client requests before they reach
//! the order lifecycle; [`schema`] checks backend configuration tables.

pub mod input;
pub mod schema;

pub use input::{has_required_keys, is_non_negative_integer, parse_non_negative_integer};
pub use schema::{ConfigSchema, Field, FieldType, Schema, ValidationError};
