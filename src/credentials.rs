//! API key loading.
//!
//! The archive API key lives in a plaintext file next to the working
//! directory. It is read once at startup; a missing key ends the run.

use crate::error::{Error, Result};
use std::io::{self, ErrorKind};
use std::path::Path;
use tracing::{error, info, instrument};

/// Read the API key stored at `path`, trimmed of surrounding whitespace.
///
/// # Errors
///
/// - [`Error::CredentialMissing`] if the file does not exist
/// - [`Error::Credential`] for any other read failure, or if the file
///   contains nothing but whitespace
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_api_key(path: &Path) -> Result<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!("API key file not found");
            return Err(Error::CredentialMissing {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            error!(error = %e, "Error reading API key file");
            return Err(Error::Credential {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let key = raw.trim();
    if key.is_empty() {
        error!("API key file is empty");
        return Err(Error::Credential {
            path: path.to_path_buf(),
            source: io::Error::new(ErrorKind::InvalidData, "API key file is empty"),
        });
    }

    info!(key_len = key.len(), "Loaded API key");
    Ok(key.to_string())
}
