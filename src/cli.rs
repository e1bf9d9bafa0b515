//! Command-line interface definitions for nyt_corpus.
//!
//! Every option has a default, so running the binary with no arguments
//! downloads 1930 through 2023 into `./corpus`.

use crate::api::{DEFAULT_BASE_URL, RetryPolicy};
use crate::corpus::CorpusConfig;
use crate::outputs::delimited::{DEFAULT_MISSING_VALUE, DEFAULT_SEPARATOR};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Download the New York Times archive one month at a time.
///
/// # Examples
///
/// ```sh
/// # Fetch 1950 through 1955 using ./nyt_api_key.txt
/// nyt_corpus --start-year 1950 --end-year 1955
///
/// # Fetch, then merge everything into one file
/// NYT_API_KEY=... nyt_corpus --start-year 2020 --end-year 2023 --concat all_nyt_data.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Year to download data from
    #[arg(long, alias = "start_year", default_value_t = 1930)]
    pub start_year: i32,

    /// Year to download data till (inclusive)
    #[arg(long, alias = "end_year", default_value_t = 2023)]
    pub end_year: i32,

    /// Directory for the per-month files
    #[arg(short, long, default_value = "corpus")]
    pub out_dir: PathBuf,

    /// File containing the API key
    #[arg(long, default_value = "nyt_api_key.txt")]
    pub api_key_file: PathBuf,

    /// API key; takes precedence over --api-key-file
    #[arg(long, env = "NYT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Column separator written between fields
    #[arg(long, default_value = DEFAULT_SEPARATOR)]
    pub separator: String,

    /// Value written for absent or empty fields
    #[arg(long, default_value = DEFAULT_MISSING_VALUE)]
    pub missing_value: String,

    /// Archive API base URL
    #[arg(long, env = "NYT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Delay before the first retry after HTTP 429, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub retry_delay_ms: u64,

    /// Retries after HTTP 429 before a month is given up
    #[arg(long, default_value_t = 10)]
    pub max_retries: usize,

    /// After fetching, merge every per-month file into this file
    #[arg(long, value_name = "PATH")]
    pub concat: Option<PathBuf>,
}

impl Cli {
    pub fn corpus_config(&self) -> CorpusConfig {
        CorpusConfig {
            out_dir: self.out_dir.clone(),
            separator: self.separator.clone(),
            missing_value: self.missing_value.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}
