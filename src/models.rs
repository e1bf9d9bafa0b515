//! Data models for archive units and extracted article metadata.
//!
//! - [`FetchUnit`]: one (year, month) archive request
//! - [`ArticleRecord`]: the flat row written to corpus files

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One month of the archive, the granule of fetching, skipping and retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchUnit {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1 through 12.
    pub month: u32,
}

impl FetchUnit {
    /// Every month of every year in `start_year..=end_year`, in calendar
    /// order. An inverted range yields nothing.
    pub fn range(start_year: i32, end_year: i32) -> impl Iterator<Item = FetchUnit> {
        (start_year..=end_year).flat_map(|year| (1..=12).map(move |month| FetchUnit { year, month }))
    }

    /// File name of the per-month corpus file, e.g. `nyt_data_1999_7.csv`.
    pub fn file_name(&self) -> String {
        format!("nyt_data_{}_{}.csv", self.year, self.month)
    }

    /// Path of the per-month corpus file under `out_dir`.
    pub fn output_path(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(self.file_name())
    }

    /// Inverse of [`FetchUnit::file_name`].
    pub fn from_file_name(name: &str) -> Option<FetchUnit> {
        let stem = name.strip_prefix("nyt_data_")?.strip_suffix(".csv")?;
        let (year, month) = stem.split_once('_')?;
        let unit = FetchUnit {
            year: year.parse().ok()?,
            month: month.parse().ok()?,
        };
        (1..=12).contains(&unit.month).then_some(unit)
    }
}

impl fmt::Display for FetchUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.month)
    }
}

/// Metadata for a single archived article.
///
/// Field order is the column order of corpus files. `None` means the API
/// returned `null`; such values are written as the missing-value sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: Option<String>,
    pub section_name: Option<String>,
    pub snippet: Option<String>,
    pub lead_paragraph: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
    pub web_url: Option<String>,
}

impl ArticleRecord {
    /// Field values paired with their column names.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("title", self.title.as_deref()),
            ("section_name", self.section_name.as_deref()),
            ("snippet", self.snippet.as_deref()),
            ("lead_paragraph", self.lead_paragraph.as_deref()),
            ("year", self.year.as_deref()),
            ("month", self.month.as_deref()),
            ("web_url", self.web_url.as_deref()),
        ]
    }

    /// Copy of this record with every absent or empty value replaced by
    /// `sentinel`.
    pub fn with_missing(&self, sentinel: &str) -> ArticleRecord {
        let fill = |v: &Option<String>| match v.as_deref() {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => Some(sentinel.to_string()),
        };
        ArticleRecord {
            title: fill(&self.title),
            section_name: fill(&self.section_name),
            snippet: fill(&self.snippet),
            lead_paragraph: fill(&self.lead_paragraph),
            year: fill(&self.year),
            month: fill(&self.month),
            web_url: fill(&self.web_url),
        }
    }
}
