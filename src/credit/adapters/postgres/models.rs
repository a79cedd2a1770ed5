//! Diesel row models for credit accounts.

use super::schema::credit_accounts;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for credit accounts.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = credit_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreditAccountRow {
    /// Owning user identifier.
    pub user_id: uuid::Uuid,
    /// Spendable balance.
    pub balance: i32,
    /// Credits spent over the account lifetime.
    pub lifetime_used: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for new credit accounts.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = credit_accounts)]
pub struct NewCreditAccountRow {
    /// Owning user identifier.
    pub user_id: uuid::Uuid,
    /// Starting balance.
    pub balance: i32,
    /// Always zero for new accounts.
    pub lifetime_used: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}
