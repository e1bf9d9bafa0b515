//! # nyt_corpus
//!
//! Downloads article metadata from the New York Times Archive API one month
//! at a time, saves each month to its own delimited file, and optionally
//! concatenates all of them into a single corpus file.
//!
//! ## Usage
//!
//! ```sh
//! echo "$KEY" > nyt_api_key.txt
//! nyt_corpus --start-year 1930 --end-year 2023 --concat all_nyt_data.csv
//! ```
//!
//! ## Architecture
//!
//! 1. **Key**: read the API key (missing key exits with status 1)
//! 2. **Fetch**: one archive request per month, retried with exponential
//!    backoff while the API answers HTTP 429
//! 3. **Extract**: keep title, section, snippet, lead paragraph, year, month
//!    and URL for each article
//! 4. **Output**: write `corpus/nyt_data_<year>_<month>.csv`, then merge

use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod corpus;
mod credentials;
mod error;
mod extract;
mod models;
mod outputs;
mod utils;

use api::{ArchiveClient, RetryFetch};
use cli::Cli;
use corpus::{CorpusBuilder, merge_corpus};
use credentials::load_api_key;
use error::{Error, Result};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("nyt_corpus starting up");

    let args = Cli::parse();
    debug!(?args.start_year, ?args.end_year, ?args.out_dir, "Parsed CLI arguments");

    match run(&args).await {
        Ok(()) => {
            let elapsed = start_time.elapsed();
            info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Cli) -> Result<()> {
    let api_key = match args.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => load_api_key(&args.api_key_file).inspect_err(|_| {
            error!("Unable to retrieve API key. Exiting.");
        })?,
    };

    ensure_writable_dir(&args.out_dir).await?;

    let client = ArchiveClient::new(&args.base_url)?;
    let corpus = CorpusBuilder::new(
        RetryFetch::new(client, args.retry_policy()),
        args.corpus_config(),
    );
    corpus
        .build_corpus(args.start_year, args.end_year, &api_key)
        .await;

    if let Some(output) = args.concat.clone() {
        let config = corpus.config().clone();
        let merged = tokio::task::spawn_blocking(move || {
            merge_corpus(
                &output,
                &config.out_dir,
                &config.separator,
                &config.missing_value,
            )
            .map(|count| (count, output))
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let (records, output) = merged?;
        info!(records, path = %output.display(), "Corpus merged");
    }

    Ok(())
}
