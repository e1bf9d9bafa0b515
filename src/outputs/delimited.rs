//! Delimited corpus files with a multi-character separator.
//!
//! Article text is full of commas, quotes and newlines, so corpus files
//! separate columns with a run of pipes (`|||||` by default). The `csv`
//! crate only accepts single-byte delimiters, so both directions go through
//! a placeholder byte:
//!
//! ```text
//! write:  records --csv(delimiter = 0xFF)--> bytes --0xFF => "|||||"--> file
//! read:   file --"|||||" => 0xFF--> temp file --csv(delimiter = 0xFF)--> records
//! ```
//!
//! `0xFF` can never occur in UTF-8 text, so it cannot collide with field
//! content. Every field is quoted, so a value that starts or ends with part
//! of the separator (`"Sports |"`) stays inside its quotes. A value that
//! contains the whole separator would still be split on read; such records
//! are rejected on write.

use crate::error::{CodecError, Error, Result};
use crate::models::ArticleRecord;
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument};

/// Intermediate single-byte delimiter.
pub const PLACEHOLDER: u8 = 0xFF;

/// Column separator used in corpus files.
pub const DEFAULT_SEPARATOR: &str = "|||||";

/// Written in place of absent or empty values.
pub const DEFAULT_MISSING_VALUE: &str = "NA";

/// Write `records` to `path`, separating columns with `separator`.
///
/// The header row holds the field names of [`ArticleRecord`]. Absent and
/// empty values are written as `missing_value`. The file is assembled in a
/// temporary file in the same directory and moved into place once complete,
/// so `path` either holds the full corpus or is left untouched.
///
/// # Errors
///
/// - [`CodecError::EmptyInput`] if `records` is empty
/// - [`CodecError::EmptySeparator`] if `separator` is empty
/// - [`CodecError::SeparatorCollision`] if a record would not survive a read
/// - [`Error::Io`] / [`CodecError::Persist`] on file system failures
#[instrument(level = "debug", skip_all, fields(path = %path.display(), count = records.len()))]
pub fn write_records(
    records: &[ArticleRecord],
    path: &Path,
    separator: &str,
    missing_value: &str,
) -> Result<()> {
    if separator.is_empty() {
        return Err(CodecError::EmptySeparator.into());
    }
    if records.is_empty() {
        return Err(CodecError::EmptyInput.into());
    }
    let sep = separator.as_bytes();

    let mut writer = WriterBuilder::new()
        .delimiter(PLACEHOLDER)
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());
    let mut row_start = 0;
    for (row, record) in records.iter().enumerate() {
        writer
            .serialize(record.with_missing(missing_value))
            .map_err(CodecError::from)?;
        writer.flush()?;

        let written = &writer.get_ref()[row_start..];
        if !survives_separator(written, sep) {
            let field = colliding_field(record, separator);
            error!(row, field = field.as_str(), "Record collides with separator");
            return Err(CodecError::SeparatorCollision { row, field }.into());
        }
        row_start = writer.get_ref().len();
    }

    let encoded = writer
        .into_inner()
        .map_err(|e| Error::Io(std::io::Error::other(e.error().to_string())))?;
    let text = expand_placeholder(&encoded, sep);

    let mut temp = NamedTempFile::new_in(parent_dir(path))?;
    temp.write_all(&text)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| CodecError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    debug!(bytes = text.len(), "Wrote delimited file");
    Ok(())
}

/// Read a file produced by [`write_records`] with the same `separator`.
///
/// The separator-to-placeholder substitution is staged in a temporary file
/// next to `path`, which is removed before returning.
///
/// # Errors
///
/// - [`Error::Io`] if `path` cannot be read (including `NotFound`)
/// - [`CodecError::PlaceholderInInput`] if the raw file already contains
///   the placeholder byte
/// - [`CodecError::Csv`] if the content does not parse, e.g. a row with a
///   different number of columns than the header
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn read_records(path: &Path, separator: &str) -> Result<Vec<ArticleRecord>> {
    if separator.is_empty() {
        return Err(CodecError::EmptySeparator.into());
    }

    let raw = std::fs::read(path)?;
    if raw.contains(&PLACEHOLDER) {
        error!("Placeholder byte present in raw file");
        return Err(CodecError::PlaceholderInInput {
            path: path.to_path_buf(),
        }
        .into());
    }
    let collapsed = collapse_separator(&raw, separator.as_bytes());

    let mut temp = tempfile::Builder::new()
        .prefix(".nyt_read_")
        .suffix(".tmp")
        .tempfile_in(parent_dir(path))?;
    temp.write_all(&collapsed)?;
    temp.flush()?;

    let records = {
        let mut reader = ReaderBuilder::new()
            .delimiter(PLACEHOLDER)
            .has_headers(true)
            .flexible(false)
            .from_reader(temp.reopen()?);
        reader
            .deserialize::<ArticleRecord>()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()
            .map_err(CodecError::from)?
    };
    temp.close()?;

    info!(count = records.len(), "Loaded delimited file");
    Ok(records)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Replace every placeholder byte with `separator`.
fn expand_placeholder(raw: &[u8], separator: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + raw.len() / 8);
    for &b in raw {
        if b == PLACEHOLDER {
            out.extend_from_slice(separator);
        } else {
            out.push(b);
        }
    }
    out
}

/// Replace non-overlapping occurrences of `separator`, scanning left to
/// right, with the placeholder byte.
fn collapse_separator(raw: &[u8], separator: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i..].starts_with(separator) {
            out.push(PLACEHOLDER);
            i += separator.len();
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    out
}

fn survives_separator(encoded: &[u8], separator: &[u8]) -> bool {
    collapse_separator(&expand_placeholder(encoded, separator), separator) == encoded
}

/// The first column whose value contains the separator. Falls back to
/// `header` for separators that clash with the quoting itself.
fn colliding_field(record: &ArticleRecord, separator: &str) -> String {
    record
        .fields()
        .iter()
        .find(|(_, v)| v.is_some_and(|v| v.contains(separator)))
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| "header".to_string())
}
