//! HTTP front end of the courier order service.
//!
//! Decodes requests into payloads, hands them to the
//! [`courier_core::OrderEngine`] and wraps results in the shared response
//! envelope.

pub mod apis;
pub mod server;
