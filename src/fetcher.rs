//! Retrying fetch engine
//!
//! Wraps the remote account client with authentication, rate-limit backoff,
//! request throttling, and observer-driven progress reporting. Fetches are
//! best-effort: on an unrecoverable error the engine reports what went wrong
//! through the progress channel and returns whatever it collected so far.

use std::collections::BTreeSet;

use tokio::time::sleep;

use crate::client::{AccountClient, AccountId, ClientError};
use crate::config::FetchConfig;
use crate::progress::ProgressChannel;

/// Solicits a one-time verification code from the operator when the remote
/// service raises a login challenge.
pub trait ChallengePrompt: Send + Sync {
    /// Return the code, or `None` to abort the login.
    fn request_code(&self, reason: &str) -> Option<String>;
}

/// A prompt that never produces a code; challenges become terminal failures.
pub struct DenyChallenges;

impl ChallengePrompt for DenyChallenges {
    fn request_code(&self, _reason: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
enum Relation {
    Followers,
    Following,
}

impl Relation {
    fn noun(self) -> &'static str {
        match self {
            Relation::Followers => "followers",
            Relation::Following => "following",
        }
    }
}

/// Fetches follower/following sets through an [`AccountClient`], retrying
/// rate-limited calls with a linearly growing backoff.
///
/// Configuration is injected at construction; the engine keeps no ambient
/// state. One instance drives one fetch at a time.
pub struct RetryingFetcher<C> {
    client: C,
    config: FetchConfig,
    progress: ProgressChannel,
}

impl<C: AccountClient> RetryingFetcher<C> {
    pub fn new(client: C, config: FetchConfig, progress: ProgressChannel) -> Self {
        Self {
            client,
            config,
            progress,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Attempt a single login. On a verification challenge the operator is
    /// asked for a code exactly once and the login is resubmitted; a second
    /// failure is terminal. Credential errors are never retried.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        prompt: &dyn ChallengePrompt,
    ) -> bool {
        self.progress.publish("Logging in...", None);

        match self.client.login(username, password, None).await {
            Ok(()) => {
                self.progress.publish("Successfully logged in", None);
                true
            }
            Err(ClientError::ChallengeRequired(reason)) => {
                self.progress
                    .publish(format!("Verification required: {}", reason), None);

                let Some(code) = prompt.request_code(&reason) else {
                    self.progress
                        .publish("Login aborted: no verification code provided", None);
                    return false;
                };

                match self.client.login(username, password, Some(&code)).await {
                    Ok(()) => {
                        self.progress.publish("Successfully logged in", None);
                        true
                    }
                    Err(err) => {
                        self.progress.publish(format!("Login failed: {}", err), None);
                        false
                    }
                }
            }
            Err(err) => {
                self.progress.publish(format!("Login failed: {}", err), None);
                false
            }
        }
    }

    /// Fetch the set of accounts following `handle`.
    pub async fn fetch_followers(&self, handle: &str) -> BTreeSet<AccountId> {
        self.fetch_relation(handle, Relation::Followers).await
    }

    /// Fetch the set of accounts `handle` follows.
    pub async fn fetch_following(&self, handle: &str) -> BTreeSet<AccountId> {
        self.fetch_relation(handle, Relation::Following).await
    }

    async fn fetch_relation(&self, handle: &str, relation: Relation) -> BTreeSet<AccountId> {
        self.progress
            .publish(format!("Fetching {}...", relation.noun()), None);

        let mut collected = BTreeSet::new();
        let mut retry_count: u32 = 0;

        loop {
            match self.fetch_once(handle, relation, &mut collected).await {
                Ok(()) => return collected,
                Err(err) if err.is_rate_limit() => {
                    if retry_count >= self.config.max_retries {
                        self.progress.publish(
                            "Maximum retry attempts reached. Please try again later.",
                            None,
                        );
                        return collected;
                    }

                    let wait = self.config.backoff_delay(retry_count);
                    self.progress.publish(
                        format!(
                            "Rate limited. Waiting {} seconds before retrying...",
                            wait.as_secs()
                        ),
                        None,
                    );
                    sleep(wait).await;
                    retry_count += 1;
                }
                Err(err) => {
                    self.progress.publish(
                        format!("Error fetching {}: {}", relation.noun(), err),
                        None,
                    );
                    return collected;
                }
            }
        }
    }

    /// One full fetch attempt. Ids accumulate into `collected` so a retry
    /// that fails later still leaves earlier results in place.
    async fn fetch_once(
        &self,
        handle: &str,
        relation: Relation,
        collected: &mut BTreeSet<AccountId>,
    ) -> Result<(), ClientError> {
        let account = self.client.resolve_handle(handle).await?;
        let related = match relation {
            Relation::Followers => self.client.list_followers(&account).await?,
            Relation::Following => self.client.list_following(&account).await?,
        };

        let total = related.len();
        let throttle = self.config.delay_between_requests();

        for (index, summary) in related.into_iter().enumerate() {
            collected.insert(summary.id);

            let processed = index + 1;
            if processed % self.config.progress_interval == 0 {
                let percentage = if total > 0 {
                    processed as f32 / total as f32 * 100.0
                } else {
                    0.0
                };
                self.progress.publish(
                    format!("Processed {}/{} {}", processed, total, relation.noun()),
                    Some(percentage),
                );
            }

            if processed < total && !throttle.is_zero() {
                sleep(throttle).await;
            }
        }

        Ok(())
    }
}
