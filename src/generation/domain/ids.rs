//! Identifier and positional types for the generation domain.

use super::GenerationDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the wrapped UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for a generation task record.
    GenerationTaskId
);

uuid_identifier!(
    /// Opaque token grouping the sibling tasks of one submission.
    BatchId
);

uuid_identifier!(
    /// Unique identifier for a user-facing result record.
    ResultId
);

uuid_identifier!(
    /// Legacy grouping identifier used by older result rows.
    ///
    /// Older writers stored the batch identifier in this column, so a
    /// variation group always carries the same UUID as its batch.
    VariationGroupId
);

impl From<BatchId> for VariationGroupId {
    fn from(batch_id: BatchId) -> Self {
        Self(batch_id.into_inner())
    }
}

impl From<VariationGroupId> for BatchId {
    fn from(group_id: VariationGroupId) -> Self {
        Self(group_id.into_inner())
    }
}

/// Zero-based position of a task within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchIndex(u32);

impl BatchIndex {
    /// Largest index representable in the current `PostgreSQL` schema.
    const MAX_PERSISTED_VALUE: u32 = i32::MAX as u32;

    /// Creates a validated batch index.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationDomainError::InvalidBatchIndex`] when the value
    /// exceeds the schema-backed maximum (`i32::MAX`).
    pub const fn new(value: u32) -> Result<Self, GenerationDomainError> {
        if value > Self::MAX_PERSISTED_VALUE {
            return Err(GenerationDomainError::InvalidBatchIndex(value));
        }
        Ok(Self(value))
    }

    /// Returns the underlying position.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BatchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
