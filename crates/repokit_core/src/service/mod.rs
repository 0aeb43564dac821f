//! Use-case services over repository contracts.
//!
//! # Responsibility
//! - Orchestrate repository calls into order-level operations.
//! - Stay storage-agnostic: services only see `CrudRepository`.

pub mod order_service;
