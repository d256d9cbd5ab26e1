//! Input resolution: reading, hashing and staging documents

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A document read from disk
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    /// Final path component, used as the document's filename
    pub filename: String,
}

/// Lowercase hex SHA-256 of the raw bytes
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn has_pdf_header(data: &[u8]) -> bool {
    data.starts_with(b"%PDF")
}

/// Read a PDF from disk, checking its header
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path)?;

    if !has_pdf_header(&data) {
        return Err(Error::InvalidDocument {
            reason: format!("{} is not a PDF file", path.display()),
        });
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(ResolvedPdf { data, filename })
}

/// Expand command-line inputs: glob patterns are expanded in sorted order,
/// plain paths pass through.
pub fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for input in inputs {
        if !input.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(input));
            continue;
        }

        let entries = glob::glob(input).map_err(|e| Error::Config {
            reason: format!("Invalid pattern {:?}: {}", input, e),
        })?;

        let before = paths.len();
        for entry in entries {
            match entry {
                Ok(path) => paths.push(path),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable path"),
            }
        }

        if paths.len() == before {
            return Err(Error::PdfNotFound {
                path: input.clone(),
            });
        }
    }

    Ok(paths)
}

/// Write uploaded bytes to a temp file under `temp_dir`.
///
/// The file is removed when the returned handle is dropped.
pub fn materialize(data: &[u8], temp_dir: &Path) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("tender-")
        .suffix(".pdf")
        .tempfile_in(temp_dir)?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}
