use crate::{config::JoineryConfig, defaults};
use std::{env, future::Future, str::FromStr};
use tokio::time::{sleep, Duration};
use tracing::warn;
use tracing_subscriber::filter::EnvFilter;

const RUST_LOG: &str = "RUST_LOG";
const HUMAN_LOGGING: &str = "HUMAN_LOGGING";

/// Trim the leading '$' or '${' and trailing '}' from an environment variable.
pub fn trim_opt_env_key(key: &str) -> &str {
    // Ambiguous key: $FOO, non-ambiguous key: ${FOO}
    match key.strip_prefix("${").and_then(|k| k.strip_suffix('}')) {
        Some(key) => key,
        None => key.strip_prefix('$').unwrap_or(key),
    }
}

/// Determine whether a given key is an environment variable.
pub fn is_opt_env_var(k: &str) -> bool {
    k.starts_with('$') || (k.starts_with("${") && k.ends_with('}'))
}

/// Health of a backing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// The service is healthy.
    OK,

    /// The service is not healthy.
    NotOk,
}

/// Attempt to connect to a database, with retries.
///
/// This function takes a closure with a database connection
/// function as an argument; said function should return a future that
/// resolves to a final value of type `Result<T, U>`. The last error is
/// returned once the retry attempts are exhausted.
pub async fn attempt_database_connection<F, Fut, T, U>(mut fut: F) -> Result<T, U>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, U>>,
    U: std::error::Error,
{
    let mut remaining_retries = defaults::MAX_DATABASE_CONNECTION_ATTEMPTS;
    let mut delay = defaults::INITIAL_RETRY_DELAY_SECS;
    loop {
        match fut().await {
            Ok(t) => break Ok(t),
            Err(e) => {
                if remaining_retries > 0 {
                    warn!(
                        "Could not connect to database: {e}. Retrying in {delay} seconds...",
                    );
                    remaining_retries -= 1;
                    sleep(Duration::from_secs(delay)).await;
                    delay *= 2;
                } else {
                    break Err(e);
                }
            }
        }
    }
}

/// Initialize the logging context for a process embedding the resolvers.
///
/// Applications call this once at startup; the library crates only emit
/// `tracing` events.
pub fn init_logging(config: &JoineryConfig) -> anyhow::Result<()> {
    let filter = match env::var_os(RUST_LOG) {
        Some(_) => EnvFilter::try_from_default_env()?,
        None => {
            // Verbose mode surfaces the composed SQL of every field resolution.
            let level = if config.verbose {
                "debug"
            } else {
                config.log_level.as_str()
            };
            EnvFilter::try_new(level)?
        }
    };

    let human_logging = match env::var_os(HUMAN_LOGGING) {
        Some(s) => bool::from_str(&s.to_string_lossy()).map_err(|_| {
            anyhow::anyhow!(
                "Expected `true` or `false` to be provided for `HUMAN_LOGGING`"
            )
        })?,
        None => true,
    };

    let sub = tracing_subscriber::fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    if human_logging {
        sub.with_ansi(true)
            .with_level(true)
            .with_line_number(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
    } else {
        sub.with_ansi(false)
            .with_level(true)
            .with_line_number(true)
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}

/// Format a SQL query for logging.
pub fn format_sql_query(s: String) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}
