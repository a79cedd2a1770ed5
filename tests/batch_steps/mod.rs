//! Step definitions for batch generation scenarios.

mod given;
mod then;
mod when;
