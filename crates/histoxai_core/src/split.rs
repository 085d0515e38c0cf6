//! Data split types for train/validation/test.

use serde::{Deserialize, Serialize};

/// Identifies one of the three disjoint subsets of a patch collection.
///
/// # Example
///
/// ```rust
/// use histoxai_core::Split;
///
/// let split = Split::Train;
/// assert!(split.is_train());
/// assert_eq!(split.file_name(), "train.npz");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    /// Training split, shuffled every pass.
    #[default]
    Train,
    /// Validation split, drives early stopping and checkpointing.
    Valid,
    /// Test split, only touched by the evaluator and attribution runs.
    Test,
}

impl Split {
    /// All splits in persistence order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    /// Check if this is the training split.
    #[must_use]
    pub const fn is_train(&self) -> bool {
        matches!(self, Split::Train)
    }

    /// Check if this is an evaluation split (valid or test).
    #[must_use]
    pub const fn is_eval(&self) -> bool {
        matches!(self, Split::Valid | Split::Test)
    }

    /// File name used when the split is persisted on its own.
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            Split::Train => "train.npz",
            Split::Valid => "valid.npz",
            Split::Test => "test.npz",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Valid => write!(f, "valid"),
            Split::Test => write!(f, "test"),
        }
    }
}

impl std::str::FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "valid" | "val" | "validation" => Ok(Split::Valid),
            "test" => Ok(Split::Test),
            other => Err(format!("unknown split '{other}', expected train, valid or test")),
        }
    }
}
