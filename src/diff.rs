use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::client::AccountId;
use crate::snapshot::{key_timestamp, Snapshot};

/// Four-way delta between a stored snapshot and freshly fetched sets.
/// Derived and immutable; owned by whoever requested the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Accounts following now that were not in the old snapshot
    pub new_followers: Vec<AccountId>,
    /// Accounts that stopped following since the old snapshot
    pub unfollowers: Vec<AccountId>,
    /// Accounts followed now that were not followed in the old snapshot
    pub new_following: Vec<AccountId>,
    /// Accounts no longer followed since the old snapshot
    pub unfollowed: Vec<AccountId>,
    /// When this comparison was computed
    #[serde(with = "key_timestamp")]
    pub timestamp: NaiveDateTime,
    /// Capture time of the old snapshot
    #[serde(with = "key_timestamp")]
    pub compared_with: NaiveDateTime,
}

impl ComparisonResult {
    /// True when nothing changed between the two captures.
    pub fn is_empty(&self) -> bool {
        self.new_followers.is_empty()
            && self.unfollowers.is_empty()
            && self.new_following.is_empty()
            && self.unfollowed.is_empty()
    }
}

fn sorted_difference(left: &BTreeSet<AccountId>, right: &BTreeSet<AccountId>) -> Vec<AccountId> {
    left.difference(right).cloned().collect()
}

/// Compare an old snapshot against freshly fetched sets. All four deltas come
/// out sorted lexicographically so the output is deterministic and diffable.
/// `compared_at` becomes the result's timestamp; the caller injects it so
/// comparisons are reproducible.
pub fn compare(
    old: &Snapshot,
    new_followers: &BTreeSet<AccountId>,
    new_following: &BTreeSet<AccountId>,
    compared_at: NaiveDateTime,
) -> ComparisonResult {
    ComparisonResult {
        new_followers: sorted_difference(new_followers, &old.followers),
        unfollowers: sorted_difference(&old.followers, new_followers),
        new_following: sorted_difference(new_following, &old.following),
        unfollowed: sorted_difference(&old.following, new_following),
        timestamp: compared_at,
        compared_with: old.taken_at,
    }
}
