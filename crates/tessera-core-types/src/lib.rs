//! Core types shared across Tessera facilities
//!
//! This crate provides foundational types used by both the error and
//! logging facilities of the session engine:
//!
//! - **Correlation types**: SessionId
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::SessionId;
