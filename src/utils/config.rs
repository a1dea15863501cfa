use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POLL_MS: u64 = 1;

pub struct Config {
    /// Crate name, used to scope the log filter.
    pub name: String,
    pub logger_level: String,
    /// Where to keep a daily log file. Logging goes to stderr only when unset.
    pub logger_dir: Option<PathBuf>,
    /// How long the scheduler sleeps when a pass makes no progress.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: env!("CARGO_PKG_NAME").to_string(),
            logger_level: String::from("warn"),
            logger_dir: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(level) = env::var("TIMETRASH_LOG") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("TIMETRASH_LOG_DIR") {
            if !dir.is_empty() {
                config.logger_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(poll) = env::var("TIMETRASH_POLL_MS") {
            match parse_poll_interval(&poll) {
                Some(interval) => config.poll_interval = interval,
                // The logger is not up yet.
                None => eprintln!(
                    "{}: ignoring TIMETRASH_POLL_MS={:?}, expected milliseconds",
                    config.name, poll
                ),
            }
        }

        config
    }
}

fn parse_poll_interval(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_millis)
}
