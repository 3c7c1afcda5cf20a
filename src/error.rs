//! Error types for the PDF highlight server

use thiserror::Error;

/// Result type alias for the PDF highlight server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF highlight server
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// The input is not a parseable PDF
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no (or a wrong) password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// A page failed to rasterize
    #[error("Failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    /// Text content of a page could not be retrieved
    #[error("Failed to extract text from page {page}: {reason}")]
    TextExtraction { page: u32, reason: String },

    /// A configured rectangle or scale factor is degenerate
    #[error("Invalid geometry configuration: {reason}")]
    GeometryConfig { reason: String },

    /// Non-geometric configuration problem
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The output document could not be assembled or written
    #[error("Export failed: {reason}")]
    ExportIo { reason: String },

    /// Cache key not found
    #[error("Cache key not found: {key}")]
    CacheKeyNotFound { key: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Image dimension exceeded
    #[error("Image dimension exceeded: {detail}")]
    ImageDimensionExceeded { detail: String },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::Render { page, .. } => format!("Failed to render page {}", page),
            Error::TextExtraction { page, .. } => {
                format!("Failed to extract text from page {}", page)
            }
            Error::GeometryConfig { reason } => {
                format!("Invalid geometry configuration: {}", reason)
            }
            Error::InvalidConfig { reason } => format!("Invalid configuration: {}", reason),
            Error::ExportIo { .. } => "Failed to export highlighted PDF".to_string(),
            Error::CacheKeyNotFound { .. } => "Cache key not found".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::ImageDimensionExceeded { detail } => {
                format!("Image dimension exceeded: {}", detail)
            }
        }
    }
}
