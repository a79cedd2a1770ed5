//! Unit tests for the credit module.
