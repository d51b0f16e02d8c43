use std::collections::BTreeSet;

use crate::client::AccountId;
use crate::progress::ProgressChannel;

/// Computes which followed accounts do not follow back.
pub struct RelationshipAnalyzer {
    progress: ProgressChannel,
}

impl RelationshipAnalyzer {
    pub fn new(progress: ProgressChannel) -> Self {
        Self { progress }
    }

    /// Pure set difference: `following \ followers`. Empty inputs yield an
    /// empty result. One summary event is published with the count found.
    pub fn find_non_followers(
        &self,
        followers: &BTreeSet<AccountId>,
        following: &BTreeSet<AccountId>,
    ) -> BTreeSet<AccountId> {
        let non_followers: BTreeSet<AccountId> =
            following.difference(followers).cloned().collect();

        self.progress.publish(
            format!(
                "Analysis complete: {} followed accounts do not follow back",
                non_followers.len()
            ),
            None,
        );

        non_followers
    }
}
