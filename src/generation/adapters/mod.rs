//! Adapter implementations for the generation ports.

pub mod memory;
pub mod openai;
pub mod postgres;
pub mod reconciling;
pub mod storage;
