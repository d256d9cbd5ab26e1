//! Error types for the tender extraction pipeline

use thiserror::Error;

/// Result type alias for the extraction pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the extraction pipeline.
///
/// Input errors (`UnsupportedLanguage` through `BatchTooLarge`) reject a
/// document before any pipeline work starts. Everything else is raised by a
/// pipeline stage and is either propagated or folded into an error-tagged
/// `DocumentResult` by the coordinator.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested language is not configured
    #[error("Unsupported language: {language}")]
    UnsupportedLanguage { language: String },

    /// Uploaded content is empty
    #[error("Empty document: {filename}")]
    EmptyDocument { filename: String },

    /// Validator rejected the document (wrong type, corrupt)
    #[error("Invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// Document exceeds the configured size limit
    #[error("File too large: {size} bytes (max: {max_size} bytes)")]
    FileTooLarge { size: u64, max_size: u64 },

    /// PDF is encrypted
    #[error("PDF is encrypted")]
    Encrypted,

    /// Too many files in one batch
    #[error("Batch too large: {count} files (max: {max})")]
    BatchTooLarge { count: usize, max: usize },

    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// OCR engine error
    #[error("OCR error: {reason}")]
    Ocr { reason: String },

    /// Image processing error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration value
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error rejects the input before the pipeline runs.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedLanguage { .. }
                | Error::EmptyDocument { .. }
                | Error::InvalidDocument { .. }
                | Error::FileTooLarge { .. }
                | Error::Encrypted
                | Error::BatchTooLarge { .. }
        )
    }

    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::UnsupportedLanguage { language } => {
                format!("Unsupported language: {}", language)
            }
            Error::EmptyDocument { .. } => "Document is empty".to_string(),
            Error::InvalidDocument { reason } => format!("Invalid document: {}", reason),
            Error::FileTooLarge { max_size, .. } => {
                format!("File exceeds maximum size of {} bytes", max_size)
            }
            Error::Encrypted => "PDF is encrypted".to_string(),
            Error::BatchTooLarge { max, .. } => {
                format!("Batch exceeds maximum of {} files", max)
            }
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Ocr { .. } => "OCR processing error".to_string(),
            Error::Image(_) => "Image processing error".to_string(),
            Error::Config { reason } => format!("Invalid configuration: {}", reason),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
        }
    }
}
