//! Mapping of raw archive responses onto [`ArticleRecord`]s.
//!
//! The archive API returns a large JSON document per month. Only a handful
//! of fields are kept:
//!
//! | Column | JSON path |
//! |--------|-----------|
//! | `title` | `headline.main` |
//! | `section_name` | `section_name` |
//! | `snippet` | `snippet` |
//! | `lead_paragraph` | `lead_paragraph` |
//! | `year` | `pub_date[0..4]` |
//! | `month` | `pub_date[5..7]` |
//! | `web_url` | `web_url` |
//!
//! A field that is absent is an error; a field that is present but `null`
//! is kept as `None`.

use crate::error::{Error, Result};
use crate::models::ArticleRecord;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Extract one [`ArticleRecord`] per document in `response.docs`.
///
/// # Errors
///
/// [`Error::MalformedResponse`] naming the first offending document and
/// field. No partial result is returned.
#[instrument(level = "debug", skip_all)]
pub fn extract_metadata(raw: &Value) -> Result<Vec<ArticleRecord>> {
    let docs = raw
        .get("response")
        .and_then(|r| r.get("docs"))
        .and_then(Value::as_array)
        .ok_or(Error::MalformedResponse {
            index: None,
            field: "response.docs",
        })?;

    let records = docs
        .iter()
        .enumerate()
        .map(|(index, doc)| extract_document(index, doc))
        .collect::<Result<Vec<_>>>()
        .inspect_err(|e| warn!(error = %e, "Rejected archive response"))?;

    debug!(count = records.len(), "Extracted article metadata");
    Ok(records)
}

fn extract_document(index: usize, doc: &Value) -> Result<ArticleRecord> {
    let headline = doc.get("headline").ok_or(Error::MalformedResponse {
        index: Some(index),
        field: "headline",
    })?;

    let pub_date = string_field(index, doc, "pub_date", "pub_date")?;
    let (year, month) = match pub_date.as_deref() {
        Some(date) => {
            let year = date.get(0..4);
            let month = date.get(5..7);
            match (year, month) {
                (Some(y), Some(m)) => (Some(y.to_string()), Some(m.to_string())),
                _ => {
                    return Err(Error::MalformedResponse {
                        index: Some(index),
                        field: "pub_date",
                    });
                }
            }
        }
        None => (None, None),
    };

    Ok(ArticleRecord {
        title: string_field(index, headline, "main", "headline.main")?,
        section_name: string_field(index, doc, "section_name", "section_name")?,
        snippet: string_field(index, doc, "snippet", "snippet")?,
        lead_paragraph: string_field(index, doc, "lead_paragraph", "lead_paragraph")?,
        year,
        month,
        web_url: string_field(index, doc, "web_url", "web_url")?,
    })
}

/// Look up `key` on `obj`. Absent keys and non-string values are malformed;
/// `null` maps to `None`.
fn string_field(
    index: usize,
    obj: &Value,
    key: &str,
    field: &'static str,
) -> Result<Option<String>> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) => Ok(None),
        _ => Err(Error::MalformedResponse {
            index: Some(index),
            field,
        }),
    }
}
