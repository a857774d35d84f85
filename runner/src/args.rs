use std::{ops::RangeInclusive, path::PathBuf, str::FromStr};

use clap::Parser;
use hyper::Uri;

use harness::{API_BASE_URL, AUTH_URL};

/// Runs the contract suite against the music catalog API.
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(long, env = "CLIENT_ID", hide_env_values = true, default_value = "")]
    pub client_id: String,
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true, default_value = "")]
    pub client_secret: String,
    #[arg(long, default_value = API_BASE_URL, value_parser = is_url_valid, env = "API_BASE_URL")]
    pub base_url: Uri,
    #[arg(long, default_value = AUTH_URL, value_parser = is_url_valid, env = "AUTH_URL")]
    pub auth_url: Uri,
    #[arg(short = 't', long = "timeout-ms", default_value_t = 5000, value_parser = in_range, env)]
    pub timeout_ms: u64,
    #[arg(short = 'l', long, default_value = "logs", env = "LOG_DIR")]
    pub log_dir: PathBuf,
    #[arg(short = 'f', long = "file")]
    pub output_file: Option<PathBuf>,
    #[arg(long = "metrics-json")]
    pub metrics_json: Option<PathBuf>,
    /// Only run cases whose id starts with this prefix
    #[arg(long)]
    pub filter: Option<String>,
}

/// Renders the run logs into a static HTML report.
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ReportArgs {
    #[arg(short = 'l', long, default_value = "logs", env = "LOG_DIR")]
    pub log_dir: PathBuf,
    /// Defaults to report.html inside the log directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

const IN_RANGE: RangeInclusive<u64> = 1..=120_000;

fn in_range(s: &str) -> Result<u64, String> {
    let millis: u64 = s.parse().map_err(|_| format!("`{s}` isn't a number"))?;
    if IN_RANGE.contains(&millis) {
        Ok(millis)
    } else {
        Err(format!(
            "timeout {} not in range {}-{}",
            s,
            IN_RANGE.start(),
            IN_RANGE.end()
        ))
    }
}

fn is_url_valid(s: &str) -> Result<Uri, String> {
    let uri = Uri::from_str(s).map_err(|e| format!("{s} {e}"))?;
    match (uri.scheme_str(), uri.host()) {
        (Some("http" | "https"), Some(_)) => Ok(uri),
        _ => Err(format!("{s} is not an absolute http(s) url")),
    }
}
