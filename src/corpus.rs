//! Corpus orchestration: per-month fetching and the final merge.
//!
//! # Pipeline
//!
//! 1. **Fetch**: for every month in the year range, fetch the archive,
//!    extract article metadata and write `nyt_data_<year>_<month>.csv`.
//!    Months whose file already exists are skipped, so an interrupted run
//!    can simply be started again.
//! 2. **Merge**: read every per-month file and write them out as one file.
//!
//! Months are processed one after another. A failure in one month is logged
//! and the run moves on; merge failures are returned to the caller.

use crate::api::FetchArchive;
use crate::error::{CodecError, Result};
use crate::extract::extract_metadata;
use crate::models::{ArticleRecord, FetchUnit};
use crate::outputs::delimited::{
    DEFAULT_MISSING_VALUE, DEFAULT_SEPARATOR, read_records, write_records,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

/// Where and how per-month files are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusConfig {
    /// Directory holding one file per month.
    pub out_dir: PathBuf,
    /// Column separator.
    pub separator: String,
    /// Sentinel for absent or empty values.
    pub missing_value: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("corpus"),
            separator: DEFAULT_SEPARATOR.to_string(),
            missing_value: DEFAULT_MISSING_VALUE.to_string(),
        }
    }
}

/// Counts reported at the end of a fetch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CorpusSummary {
    /// Months fetched and written in this run.
    pub fetched: usize,
    /// Months skipped because their file already existed.
    pub skipped: usize,
    /// Months that failed and have no file.
    pub failed: usize,
    /// Articles written in this run.
    pub articles: usize,
}

/// Drives a [`FetchArchive`] over a range of months.
#[derive(Debug)]
pub struct CorpusBuilder<F> {
    fetcher: F,
    config: CorpusConfig,
}

impl<F> CorpusBuilder<F>
where
    F: FetchArchive,
{
    pub fn new(fetcher: F, config: CorpusConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// Fetch every month from January of `start_year` through December of
    /// `end_year` that does not have a file yet.
    ///
    /// Never fails as a whole: each month's error is logged and counted in
    /// [`CorpusSummary::failed`].
    #[instrument(level = "info", skip(self, api_key), fields(out_dir = %self.config.out_dir.display()))]
    pub async fn build_corpus(&self, start_year: i32, end_year: i32, api_key: &str) -> CorpusSummary {
        let mut summary = CorpusSummary::default();

        for unit in FetchUnit::range(start_year, end_year) {
            let path = unit.output_path(&self.config.out_dir);
            if path.exists() {
                info!(%unit, "Data already exists; skipping");
                summary.skipped += 1;
                continue;
            }

            info!(%unit, "Fetching data");
            match self.fetch_unit(unit, &path, api_key).await {
                Ok(count) => {
                    info!(%unit, count, path = %path.display(), "Data saved");
                    summary.fetched += 1;
                    summary.articles += count;
                }
                Err(e) => {
                    error!(%unit, error = %e, "Error fetching data; skipping unit");
                    summary.failed += 1;
                }
            }
        }

        info!(
            fetched = summary.fetched,
            skipped = summary.skipped,
            failed = summary.failed,
            articles = summary.articles,
            "Corpus fetch complete"
        );
        summary
    }

    /// Fetch, extract and write a single month. Returns the article count.
    async fn fetch_unit(&self, unit: FetchUnit, path: &Path, api_key: &str) -> Result<usize> {
        let raw = self.fetcher.fetch(unit, api_key).await?;
        let records = extract_metadata(&raw)?;
        info!(%unit, count = records.len(), "Successfully fetched articles");
        write_records(
            &records,
            path,
            &self.config.separator,
            &self.config.missing_value,
        )?;
        Ok(records.len())
    }
}

/// Concatenate every `.csv` file in `source_dir` into `output_path`.
///
/// Per-month files are taken in calendar order, followed by any other
/// `.csv` files in name order; records keep their in-file order.
/// `output_path` itself is left out if it lives in `source_dir`. Returns
/// the number of records written.
///
/// # Errors
///
/// Any read or write failure aborts the merge. An empty directory yields
/// [`CodecError::EmptyInput`].
#[instrument(level = "info", fields(output = %output_path.display(), source = %source_dir.display()), skip_all)]
pub fn merge_corpus(
    output_path: &Path,
    source_dir: &Path,
    separator: &str,
    missing_value: &str,
) -> Result<usize> {
    let files = corpus_files(source_dir, output_path)?;
    info!(count = files.len(), "Found {} files.", files.len());

    let mut all: Vec<ArticleRecord> = Vec::new();
    info!("Loading data...");
    for path in &files {
        all.extend(read_records(path, separator)?);
    }
    if all.is_empty() {
        return Err(CodecError::EmptyInput.into());
    }

    info!(
        records = all.len(),
        "Saving data to {}, may take a while...",
        output_path.display()
    );
    write_records(&all, output_path, separator, missing_value)?;
    Ok(all.len())
}

/// `.csv` files in `dir`, excluding `exclude`, in merge order.
fn corpus_files(dir: &Path, exclude: &Path) -> Result<Vec<PathBuf>> {
    let exclude = exclude.canonicalize().ok();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "csv") {
            continue;
        }
        if exclude.is_some() && path.canonicalize().ok() == exclude {
            continue;
        }
        files.push(path);
    }

    files.sort_by_cached_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let unit = FetchUnit::from_file_name(&name).map(|u| (u.year, u.month));
        (unit.is_none(), unit, name)
    });
    Ok(files)
}
