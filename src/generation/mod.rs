//! Batch product-ad image generation.
//!
//! A submission for K variants becomes K generation tasks sharing one batch
//! identifier. Tasks run one at a time per batch: each finished task queues
//! its next pending sibling. Every task write is mirrored onto the
//! user-facing result records, whichever link scheme those records carry.
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Application services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
