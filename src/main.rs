use std::io::{self, BufRead, Write};
use std::process;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use dotenv::dotenv;

use followdiff::{
    cli::Cli,
    compare,
    http::HttpAccountClient,
    AccountId, ChallengePrompt, ComparisonResult, ProgressChannel, ProgressEvent,
    ProgressListener, RelationshipAnalyzer, RetryingFetcher, Snapshot, SnapshotStore,
};

/// Prints progress events to stdout; `message - NN.N%` when a percentage is
/// attached.
struct ConsoleListener;

impl ProgressListener for ConsoleListener {
    fn on_progress(&self, event: &ProgressEvent) {
        match event.percentage {
            Some(percentage) => println!("{} - {:.1}%", event.message, percentage),
            None => println!("{}", event.message),
        }
    }
}

/// Reads a one-time verification code from stdin.
struct StdinChallengePrompt;

impl ChallengePrompt for StdinChallengePrompt {
    fn request_code(&self, reason: &str) -> Option<String> {
        print!("Verification required ({}). Enter code: ", reason);
        io::stdout().flush().ok()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;

        let code = line.trim();
        if code.is_empty() {
            None
        } else {
            Some(code.to_string())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        process::exit(1);
    }

    cli.setup_logging();

    let config = cli.to_config();
    if let Err(err) = config.validate() {
        eprintln!("Error: {}", err);
        process::exit(1);
    }

    let username = std::env::var("FOLLOWDIFF_USERNAME").unwrap_or_default();
    let password = std::env::var("FOLLOWDIFF_PASSWORD").unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        eprintln!("Error: FOLLOWDIFF_USERNAME and FOLLOWDIFF_PASSWORD must be set in the environment or .env file");
        process::exit(1);
    }

    let service_url = std::env::var("FOLLOWDIFF_SERVICE_URL").unwrap_or_default();
    if service_url.is_empty() {
        eprintln!("Error: FOLLOWDIFF_SERVICE_URL must be set in the environment or .env file");
        process::exit(1);
    }

    // The target defaults to the authenticated account.
    let target = cli.handle.clone().unwrap_or_else(|| username.clone());
    let store = SnapshotStore::new(&config.storage.data_dir);

    if cli.list {
        let entries = store.list_available(&target)?;
        if entries.is_empty() {
            println!("No snapshots stored for {}", target);
        } else {
            for entry in entries {
                println!("{}  {}", entry.display_label, entry.path.display());
            }
        }
        return Ok(());
    }

    let client = match HttpAccountClient::new(&service_url) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    };

    let mut progress = ProgressChannel::new();
    progress.subscribe(Arc::new(ConsoleListener));

    let fetcher = RetryingFetcher::new(client, config.fetch.clone(), progress.clone());

    if !fetcher
        .authenticate(&username, &password, &StdinChallengePrompt)
        .await
    {
        eprintln!("Error: login failed");
        process::exit(1);
    }

    tracing::info!("Fetching relationship data for {}", target);
    let followers = fetcher.fetch_followers(&target).await;
    let following = fetcher.fetch_following(&target).await;

    let analyzer = RelationshipAnalyzer::new(progress.clone());
    let non_followers = analyzer.find_non_followers(&followers, &following);

    println!("\nAccounts {} follows that do not follow back:", target);
    for account in &non_followers {
        print_entry("-", account.as_str(), cli.no_color);
    }
    println!("\nTotal: {} accounts", non_followers.len());

    let taken_at = Local::now().naive_local();

    if cli.save {
        let snapshot = Snapshot::new(&target, taken_at, followers.clone(), following.clone());
        let path = store.save(&snapshot)?;
        println!("\nSnapshot saved to {}", path.display());
    }

    if let Some(ref compare_path) = cli.compare {
        match store.load(compare_path)? {
            Some(old) => {
                let comparison = compare(&old, &followers, &following, taken_at);
                print_comparison(&comparison, cli.no_color);

                if cli.save {
                    let path = store.save_comparison(&target, &comparison)?;
                    println!("\nComparison saved to {}", path.display());
                }
            }
            None => {
                eprintln!("Error: could not load snapshot {}", compare_path.display());
                process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_comparison(comparison: &ComparisonResult, no_color: bool) {
    println!("\n=== Comparison results ===");
    println!(
        "Compared with data from: {}",
        comparison.compared_with.format("%Y-%m-%d %H:%M")
    );

    print_section("New followers:", "+", &comparison.new_followers, no_color);
    print_section("Unfollowers:", "-", &comparison.unfollowers, no_color);
    print_section("New following:", "+", &comparison.new_following, no_color);
    print_section("No longer followed:", "-", &comparison.unfollowed, no_color);

    if comparison.is_empty() {
        println!("\nNo changes since the previous snapshot.");
    }

    println!(
        "\nCompared at: {}",
        comparison.timestamp.format("%Y-%m-%d %H:%M")
    );
}

fn print_section(title: &str, sign: &str, accounts: &[AccountId], no_color: bool) {
    if accounts.is_empty() {
        return;
    }

    println!("\n{}", title);
    for account in accounts {
        print_entry(sign, account.as_str(), no_color);
    }
}

fn print_entry(sign: &str, account: &str, no_color: bool) {
    if no_color {
        println!("{} {}", sign, account);
    } else {
        let color = if sign == "+" { "\x1b[32m" } else { "\x1b[31m" };
        println!("{}{}\x1b[0m {}", color, sign, account);
    }
}
