//! Endpoint implementations and request decoding.

pub mod order;
pub mod payload;
