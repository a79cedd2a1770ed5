//! Diesel schema for credit accounts.

diesel::table! {
    /// One credit account per user.
    credit_accounts (user_id) {
        /// Owning user identifier.
        user_id -> Uuid,
        /// Spendable balance; a check constraint keeps it non-negative.
        balance -> Int4,
        /// Credits spent over the account lifetime.
        lifetime_used -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last mutation timestamp.
        updated_at -> Timestamptz,
    }
}
