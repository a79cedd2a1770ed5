//! Generation credit accounting.
//!
//! Every user owns a single credit account. Accounts are created lazily with
//! a configurable starting balance and are only ever mutated through atomic
//! increments and decrements, so concurrent batch submissions from the same
//! user can never overspend. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;
