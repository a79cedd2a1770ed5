//! Domain model for credit accounts.

mod balance;
mod error;
mod ids;

pub use balance::{CreditAmount, CreditBalance, CreditCheck, DEFAULT_STARTING_CREDITS};
pub use error::CreditDomainError;
pub use ids::UserId;
