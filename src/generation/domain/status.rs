//! Generation status state machine shared by task and result records.

use super::ParseGenerationStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a generation task and its mirrored result record.
///
/// ```text
/// pending ──► processing ──► completed
///    │             │
///    └─────────────┴───────► failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Created and waiting to be picked up.
    Pending,
    /// A worker is generating the image.
    Processing,
    /// The image was generated and stored.
    Completed,
    /// Generation failed; the error message is recorded.
    Failed,
}

impl GenerationStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for states with no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns `true` when moving from `self` to `target` is permitted.
    ///
    /// Self-transitions are never permitted.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Processing | Self::Failed)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for GenerationStatus {
    type Error = ParseGenerationStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseGenerationStatusError(value.to_owned())),
        }
    }
}
