//! Upload validation using qpdf (vendored FFI)

use crate::error::{Error, Result};
use qpdf::QPdf;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Why a file was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    InvalidType,
    TooLarge,
    Encrypted,
    Corrupt,
}

/// Outcome of validating one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RejectionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

impl ValidationReport {
    pub fn ok(page_count: u32) -> Self {
        Self {
            valid: true,
            kind: None,
            error: None,
            page_count: Some(page_count),
        }
    }

    pub fn rejected(kind: RejectionKind, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            kind: Some(kind),
            error: Some(error.into()),
            page_count: None,
        }
    }
}

/// Checks an uploaded file before fragment extraction.
///
/// Must reject non-PDF content, oversized files and encrypted PDFs.
pub trait DocumentValidator: Send + Sync {
    fn validate(&self, path: &Path) -> Result<ValidationReport>;
}

/// Validator backed by header sniffing and qpdf
#[derive(Debug, Clone)]
pub struct QpdfValidator {
    max_file_size: u64,
}

impl QpdfValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

/// Sniff the MIME type from the leading bytes.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    // Some producers emit a few junk bytes before the header.
    let head = &data[..data.len().min(1024)];
    if head.windows(5).any(|w| w == b"%PDF-") {
        "application/pdf"
    } else if head.starts_with(b"\x89PNG") {
        "image/png"
    } else if head.starts_with(b"\xFF\xD8\xFF") {
        "image/jpeg"
    } else if head.starts_with(b"PK\x03\x04") {
        "application/zip"
    } else {
        "application/octet-stream"
    }
}

impl DocumentValidator for QpdfValidator {
    fn validate(&self, path: &Path) -> Result<ValidationReport> {
        let size = std::fs::metadata(path)?.len();
        if size > self.max_file_size {
            return Ok(ValidationReport::rejected(
                RejectionKind::TooLarge,
                format!(
                    "File too large: {} bytes (max: {} bytes)",
                    size, self.max_file_size
                ),
            ));
        }

        let data = std::fs::read(path)?;
        let mime = sniff_mime(&data);
        if mime != "application/pdf" {
            return Ok(ValidationReport::rejected(
                RejectionKind::InvalidType,
                format!("Invalid file type: {}", mime),
            ));
        }

        let qpdf = match QPdf::read_from_memory(&data) {
            Ok(q) => q,
            Err(e) if matches!(e.error_code(), qpdf::QPdfErrorCode::InvalidPassword) => {
                return Ok(ValidationReport::rejected(
                    RejectionKind::Encrypted,
                    "PDF is encrypted",
                ));
            }
            Err(e) => {
                return Ok(ValidationReport::rejected(
                    RejectionKind::Corrupt,
                    format!("Corrupt PDF: {}", e),
                ));
            }
        };

        if qpdf.is_encrypted() {
            return Ok(ValidationReport::rejected(
                RejectionKind::Encrypted,
                "PDF is encrypted",
            ));
        }

        let page_count = qpdf.get_num_pages().map_err(|e| Error::InvalidDocument {
            reason: format!("Failed to count pages: {}", e),
        })?;

        Ok(ValidationReport::ok(page_count))
    }
}

/// Map a rejected report onto the matching input error.
pub fn rejection_error(report: &ValidationReport, size: u64, max_size: u64) -> Error {
    let reason = report
        .error
        .clone()
        .unwrap_or_else(|| "validation failed".to_string());

    match report.kind {
        Some(RejectionKind::Encrypted) => Error::Encrypted,
        Some(RejectionKind::TooLarge) => Error::FileTooLarge { size, max_size },
        Some(RejectionKind::InvalidType | RejectionKind::Corrupt) | None => {
            Error::InvalidDocument { reason }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(b"%PDF-1.7\n..."), "application/pdf");
        assert_eq!(sniff_mime(b"\r\n%PDF-1.4"), "application/pdf");
        assert_eq!(sniff_mime(b"\x89PNG\r\n\x1a\n"), "image/png");
        assert_eq!(sniff_mime(b"PK\x03\x04word/document.xml"), "application/zip");
        assert_eq!(sniff_mime(b""), "application/octet-stream");
    }

    #[test]
    fn test_rejects_non_pdf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"PK\x03\x04 not a pdf").unwrap();

        let report = QpdfValidator::new(1024).validate(file.path()).unwrap();
        assert!(!report.valid);
        assert_eq!(report.kind, Some(RejectionKind::InvalidType));
        assert!(report.error.unwrap().contains("application/zip"));
    }

    #[test]
    fn test_rejects_oversized() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'%'; 64]).unwrap();

        let report = QpdfValidator::new(16).validate(file.path()).unwrap();
        assert!(!report.valid);
        assert!(matches!(
            rejection_error(&report, 64, 16),
            Error::FileTooLarge {
                size: 64,
                max_size: 16
            }
        ));
    }

    #[test]
    fn test_rejection_error_mapping() {
        let report = ValidationReport::rejected(RejectionKind::Encrypted, "PDF is encrypted");
        assert!(matches!(rejection_error(&report, 1, 2), Error::Encrypted));

        let report =
            ValidationReport::rejected(RejectionKind::InvalidType, "Invalid file type: image/png");
        assert!(matches!(
            rejection_error(&report, 1, 2),
            Error::InvalidDocument { .. }
        ));
    }

    #[test]
    fn test_rejection_error_ignores_message_wording() {
        let report = ValidationReport::rejected(
            RejectionKind::Corrupt,
            "Corrupt PDF: error reading encrypted stream dictionary",
        );
        match rejection_error(&report, 1, 2) {
            Error::InvalidDocument { reason } => assert!(reason.contains("encrypted")),
            other => panic!("expected InvalidDocument, got {:?}", other),
        }

        let report = ValidationReport::rejected(RejectionKind::TooLarge, "upload exceeds limit");
        assert!(matches!(
            rejection_error(&report, 9, 4),
            Error::FileTooLarge {
                size: 9,
                max_size: 4
            }
        ));
    }
}
