use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use followdiff::{
    compare, AccountClient, AccountId, AccountRef, AccountSummary, ClientError, FetchConfig,
    ProgressChannel, ProgressEvent, ProgressListener, RelationshipAnalyzer, RetryingFetcher,
    Snapshot, SnapshotStore,
};

/// Account client scripted for tests: optionally fails the first N listing
/// calls with queued errors, then serves fixed collections.
struct ScriptedClient {
    followers: Vec<AccountSummary>,
    following: Vec<AccountSummary>,
    list_errors: Mutex<VecDeque<ClientError>>,
    list_attempts: AtomicUsize,
}

impl ScriptedClient {
    fn new(followers: &[&str], following: &[&str]) -> Self {
        Self {
            followers: followers.iter().map(|id| AccountSummary::new(*id)).collect(),
            following: following.iter().map(|id| AccountSummary::new(*id)).collect(),
            list_errors: Mutex::new(VecDeque::new()),
            list_attempts: AtomicUsize::new(0),
        }
    }

    fn with_list_errors(self, errors: Vec<ClientError>) -> Self {
        *self.list_errors.lock().unwrap() = errors.into();
        self
    }

    fn attempts(&self) -> usize {
        self.list_attempts.load(Ordering::SeqCst)
    }

    fn next_error(&self) -> Option<ClientError> {
        self.list_errors.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl AccountClient for ScriptedClient {
    async fn login(
        &self,
        _username: &str,
        _password: &str,
        _code: Option<&str>,
    ) -> Result<(), ClientError> {
        Ok(())
    }

    async fn resolve_handle(&self, handle: &str) -> Result<AccountRef, ClientError> {
        Ok(AccountRef::new(format!("ref-{}", handle)))
    }

    async fn list_followers(
        &self,
        _account: &AccountRef,
    ) -> Result<Vec<AccountSummary>, ClientError> {
        self.list_attempts.fetch_add(1, Ordering::SeqCst);
        match self.next_error() {
            Some(err) => Err(err),
            None => Ok(self.followers.clone()),
        }
    }

    async fn list_following(
        &self,
        _account: &AccountRef,
    ) -> Result<Vec<AccountSummary>, ClientError> {
        self.list_attempts.fetch_add(1, Ordering::SeqCst);
        match self.next_error() {
            Some(err) => Err(err),
            None => Ok(self.following.clone()),
        }
    }
}

#[derive(Default)]
struct Collector {
    events: Mutex<Vec<ProgressEvent>>,
}

impl Collector {
    fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    fn percentages(&self) -> Vec<f32> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.percentage)
            .collect()
    }
}

impl ProgressListener for Collector {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn rate_limit_error() -> ClientError {
    ClientError::Client("rate limit exceeded, please wait".to_string())
}

fn quick_config(max_retries: u32) -> FetchConfig {
    FetchConfig {
        delay_between_requests_secs: 0,
        max_retries,
        retry_delay_secs: 1,
        progress_interval: 5,
    }
}

fn fetcher_with(
    client: ScriptedClient,
    config: FetchConfig,
    collector: Arc<Collector>,
) -> RetryingFetcher<ScriptedClient> {
    let mut progress = ProgressChannel::new();
    progress.subscribe(collector);
    RetryingFetcher::new(client, config, progress)
}

fn ids(names: &[&str]) -> BTreeSet<AccountId> {
    names.iter().map(|n| AccountId::from(*n)).collect()
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_fetch_returns_full_set() {
    let client = ScriptedClient::new(&["a", "b", "c"], &[]);
    let collector = Arc::new(Collector::default());
    let fetcher = fetcher_with(client, quick_config(5), collector);

    let followers = fetcher.fetch_followers("alice").await;

    assert_eq!(followers, ids(&["a", "b", "c"]));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_deduplicates_ids() {
    let client = ScriptedClient::new(&["a", "b", "a", "b"], &[]);
    let collector = Arc::new(Collector::default());
    let fetcher = fetcher_with(client, quick_config(5), collector);

    let followers = fetcher.fetch_followers("alice").await;

    assert_eq!(followers, ids(&["a", "b"]));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_ceiling_stops_retrying() {
    // Every listing call is rate limited; the queue outlasts the ceiling.
    let errors = std::iter::repeat_with(rate_limit_error).take(10).collect();
    let client = ScriptedClient::new(&["a"], &[]).with_list_errors(errors);
    let collector = Arc::new(Collector::default());
    let fetcher = fetcher_with(client, quick_config(2), collector.clone());

    let followers = fetcher.fetch_followers("alice").await;

    assert!(followers.is_empty());
    // One initial attempt plus exactly max_retries retries, never more.
    assert_eq!(fetcher.client().attempts(), 3);
    let messages = collector.messages();
    assert!(messages
        .last()
        .unwrap()
        .contains("Maximum retry attempts reached"));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_grow_linearly() {
    let client = ScriptedClient::new(&["a", "b"], &[])
        .with_list_errors(vec![rate_limit_error(), rate_limit_error()]);
    let collector = Arc::new(Collector::default());
    let config = FetchConfig {
        delay_between_requests_secs: 0,
        max_retries: 5,
        retry_delay_secs: 10,
        progress_interval: 5,
    };
    let fetcher = fetcher_with(client, config, collector);

    let start = tokio::time::Instant::now();
    let followers = fetcher.fetch_followers("alice").await;

    // Two rate-limited attempts: waits of 10s then 20s before succeeding.
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert_eq!(followers, ids(&["a", "b"]));
}

#[tokio::test(start_paused = true)]
async fn test_non_rate_limit_error_aborts_without_retry() {
    let client = ScriptedClient::new(&["a"], &[])
        .with_list_errors(vec![ClientError::Client("connection reset".to_string())]);
    let collector = Arc::new(Collector::default());
    let fetcher = fetcher_with(client, quick_config(5), collector.clone());

    let followers = fetcher.fetch_followers("alice").await;

    assert!(followers.is_empty());
    assert_eq!(fetcher.client().attempts(), 1);
    assert!(collector
        .messages()
        .iter()
        .any(|m| m.contains("connection reset")));
}

#[tokio::test(start_paused = true)]
async fn test_progress_percentages_every_fifth_item() {
    let names: Vec<String> = (0..12).map(|i| format!("user{:02}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let client = ScriptedClient::new(&name_refs, &[]);
    let collector = Arc::new(Collector::default());
    let fetcher = fetcher_with(client, quick_config(5), collector.clone());

    let followers = fetcher.fetch_followers("alice").await;

    assert_eq!(followers.len(), 12);
    let percentages = collector.percentages();
    assert_eq!(percentages.len(), 2);
    assert!((percentages[0] - 5.0 / 12.0 * 100.0).abs() < 0.01);
    assert!((percentages[1] - 10.0 / 12.0 * 100.0).abs() < 0.01);
}

#[tokio::test(start_paused = true)]
async fn test_throttle_paces_item_processing() {
    let client = ScriptedClient::new(&["a", "b", "c", "d"], &[]);
    let collector = Arc::new(Collector::default());
    let config = FetchConfig {
        delay_between_requests_secs: 5,
        max_retries: 5,
        retry_delay_secs: 10,
        progress_interval: 5,
    };
    let fetcher = fetcher_with(client, config, collector);

    let start = tokio::time::Instant::now();
    fetcher.fetch_followers("alice").await;

    // Three inter-item pauses for four items.
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_empty_collection_fetches_cleanly() {
    let client = ScriptedClient::new(&[], &[]);
    let collector = Arc::new(Collector::default());
    let fetcher = fetcher_with(client, quick_config(5), collector.clone());

    let followers = fetcher.fetch_followers("alice").await;

    assert!(followers.is_empty());
    assert!(collector.percentages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_full_pipeline_fetch_analyze_save_compare() {
    let client = ScriptedClient::new(&["a", "b"], &["a", "b", "c"]);
    let collector = Arc::new(Collector::default());
    let fetcher = fetcher_with(client, quick_config(5), collector.clone());

    assert!(
        fetcher
            .authenticate("alice", "hunter2", &followdiff::DenyChallenges)
            .await
    );

    let followers = fetcher.fetch_followers("alice").await;
    let following = fetcher.fetch_following("alice").await;

    let mut progress = ProgressChannel::new();
    progress.subscribe(collector.clone());
    let analyzer = RelationshipAnalyzer::new(progress);
    let non_followers = analyzer.find_non_followers(&followers, &following);
    assert_eq!(non_followers, ids(&["c"]));

    // Persist, reload, and diff against a moved state.
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(temp_dir.path());
    let snapshot = Snapshot::new("alice", at(2024, 3, 17, 9, 0), followers, following);
    let path = store.save(&snapshot).unwrap();

    let old = store.load(&path).unwrap().expect("snapshot should load");
    let new_followers = ids(&["b", "c"]);
    let new_following = ids(&["a", "b", "c", "d"]);
    let comparison = compare(&old, &new_followers, &new_following, at(2024, 3, 19, 14, 20));

    assert_eq!(comparison.new_followers, vec![AccountId::from("c")]);
    assert_eq!(comparison.unfollowers, vec![AccountId::from("a")]);
    assert_eq!(comparison.new_following, vec![AccountId::from("d")]);
    assert!(comparison.unfollowed.is_empty());

    let comparison_path = store.save_comparison("alice", &comparison).unwrap();
    assert!(comparison_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap()
        .contains("_comparison_"));

    // The comparison artifact must not pollute the snapshot listing.
    let entries = store.list_available("alice").unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_round_trip_preserves_sets() {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(temp_dir.path());

    let followers = ids(&["zoe", "amy"]);
    let following = ids(&["bob"]);
    let snapshot = Snapshot::new("alice", at(2024, 3, 19, 14, 20), followers.clone(), following.clone());

    let path = store.save(&snapshot).unwrap();
    let loaded = store.load(&path).unwrap().unwrap();

    assert_eq!(loaded.username, "alice");
    assert_eq!(loaded.followers, followers);
    assert_eq!(loaded.following, following);

    // A fresh fetch identical to the snapshot diffs to nothing.
    let comparison = compare(&loaded, &followers, &following, at(2024, 3, 20, 9, 0));
    assert!(comparison.is_empty());
}
