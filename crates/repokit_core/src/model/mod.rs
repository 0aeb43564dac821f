//! Domain model and the entity contract repositories are generic over.
//!
//! # Invariants
//! - Every persisted entity carries a store-unique identifier.
//! - An entity that was never saved has no identifier yet.

pub mod entity;
pub mod order;
