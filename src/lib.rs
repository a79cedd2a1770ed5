//! Photoshoot: batch AI product-ad image generation.
//!
//! A user submits a product prompt, optional reference images and a variant
//! count. The submission is charged against the user's credit balance and
//! expanded into one generation task per variant. A worker runs the tasks of
//! each batch one after another, stores the generated images, and mirrors
//! every task state change onto the user-facing result records. Clients
//! follow a batch through its aggregate progress.
//!
//! # Architecture
//!
//! Photoshoot follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, APIs, etc.)
//! - **Services**: Application workflows composed from ports
//!
//! # Modules
//!
//! - [`credit`]: Per-user credit balances and atomic deduction
//! - [`generation`]: Batch submission, task processing and result sync
//! - [`config`]: Environment-driven worker configuration
//! - [`deployment`]: Production adapters and services built from configuration
//! - [`telemetry`]: Structured logging setup

pub mod config;
pub mod credit;
pub mod deployment;
pub mod generation;
pub mod telemetry;
