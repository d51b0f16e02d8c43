use std::path::PathBuf;

use clap::Parser;

use crate::config::TrackerConfig;

#[derive(Parser)]
#[command(name = "followdiff")]
#[command(version = "0.2.0")]
#[command(about = "Track a social account's followers and find who does not follow back")]
#[command(
    long_about = "followdiff fetches an account's follower and following sets from the remote \
account service, reports which followed accounts do not reciprocate, and can persist timestamped \
snapshots and diff them over time. Credentials are read from FOLLOWDIFF_USERNAME and \
FOLLOWDIFF_PASSWORD (a .env file is honored); the service endpoint from FOLLOWDIFF_SERVICE_URL."
)]
pub struct Cli {
    /// Account handle to analyze
    #[arg(value_name = "HANDLE", help = "Account handle to analyze (defaults to the authenticated account)")]
    pub handle: Option<String>,

    /// Persist a snapshot of the fetched sets
    #[arg(long, help = "Save the fetched follower/following sets as a snapshot")]
    pub save: bool,

    /// Compare against a previously saved snapshot file
    #[arg(long, value_name = "FILE", help = "Compare against a previously saved snapshot file")]
    pub compare: Option<PathBuf>,

    /// List stored snapshots for the handle and exit
    #[arg(long, help = "List stored snapshots for the handle and exit")]
    pub list: bool,

    /// Directory where snapshots are stored
    #[arg(long, value_name = "DIR", help = "Snapshot storage directory (default: data)")]
    pub data_dir: Option<PathBuf>,

    /// Seconds to pause between processed items
    #[arg(long, value_name = "SECS", help = "Seconds to pause between processed items")]
    pub delay: Option<u64>,

    /// Retry ceiling for rate-limited fetches
    #[arg(long, value_name = "N", help = "Maximum retries when rate limited")]
    pub max_retries: Option<u32>,

    /// Base backoff delay in seconds
    #[arg(long, value_name = "SECS", help = "Base backoff delay in seconds")]
    pub retry_delay: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colors in output
    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,
}

impl Cli {
    /// Resolve the effective configuration: defaults, then environment
    /// variables, then CLI flags.
    pub fn to_config(&self) -> TrackerConfig {
        let mut config = TrackerConfig::from_env();

        if let Some(ref dir) = self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if let Some(delay) = self.delay {
            config.fetch.delay_between_requests_secs = delay;
        }
        if let Some(max) = self.max_retries {
            config.fetch.max_retries = max;
        }
        if let Some(delay) = self.retry_delay {
            config.fetch.retry_delay_secs = delay;
        }

        config
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref path) = self.compare {
            if !path.exists() {
                return Err(format!("Snapshot file does not exist: {}", path.display()));
            }
        }

        if self.list && (self.save || self.compare.is_some()) {
            return Err("--list cannot be combined with --save or --compare".to_string());
        }

        Ok(())
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            handle: None,
            save: false,
            compare: None,
            list: false,
            data_dir: None,
            delay: None,
            max_retries: None,
            retry_delay: None,
            verbose: false,
            no_color: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli {
            data_dir: Some(PathBuf::from("elsewhere")),
            delay: Some(0),
            max_retries: Some(2),
            retry_delay: Some(1),
            ..Default::default()
        };

        let config = cli.to_config();

        assert_eq!(config.storage.data_dir, PathBuf::from("elsewhere"));
        assert_eq!(config.fetch.delay_between_requests_secs, 0);
        assert_eq!(config.fetch.max_retries, 2);
        assert_eq!(config.fetch.retry_delay_secs, 1);
    }

    #[test]
    fn test_defaults_pass_through() {
        let config = Cli::default().to_config();

        // Untouched by flags or any FOLLOWDIFF_* variable.
        assert_eq!(config.fetch.progress_interval, 5);
    }

    #[test]
    fn test_validate_rejects_missing_compare_file() {
        let cli = Cli {
            compare: Some(PathBuf::from("/definitely/not/here.json")),
            ..Default::default()
        };

        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_list_with_save() {
        let cli = Cli {
            list: true,
            save: true,
            ..Default::default()
        };

        assert!(cli.validate().is_err());
    }
}
