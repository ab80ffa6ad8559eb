//! Merge policies applied when folding two revisions of one entity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conflict-resolution strategy for content fields.
///
/// Policies only govern content. Identifier sets are unioned whatever the
/// policy says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Keep the existing content, ignore the incoming revision's content.
    #[serde(rename = "NONE")]
    None,
    /// Refuse to merge into an existing entity.
    #[serde(rename = "ERR")]
    Err,
    /// Only fill fields that are absent or null in the existing content.
    #[serde(rename = "APPEND_NEW__LEAVE_EXISTING")]
    AppendNewLeaveExisting,
    /// Non-null incoming fields overwrite existing ones.
    #[default]
    #[serde(rename = "APPEND_NEW__OVERWRITE_EXISTING")]
    AppendNewOverwriteExisting,
    /// Incoming content replaces existing content wholesale.
    #[serde(rename = "OVERWRITE_ALL")]
    OverwriteAll,
}

impl MergePolicy {
    /// Every policy, in declaration order.
    pub const ALL: [MergePolicy; 5] = [
        MergePolicy::None,
        MergePolicy::Err,
        MergePolicy::AppendNewLeaveExisting,
        MergePolicy::AppendNewOverwriteExisting,
        MergePolicy::OverwriteAll,
    ];

    /// The persisted name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::None => "NONE",
            MergePolicy::Err => "ERR",
            MergePolicy::AppendNewLeaveExisting => "APPEND_NEW__LEAVE_EXISTING",
            MergePolicy::AppendNewOverwriteExisting => "APPEND_NEW__OVERWRITE_EXISTING",
            MergePolicy::OverwriteAll => "OVERWRITE_ALL",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
