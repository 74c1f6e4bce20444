//! Import and export error types
//!
//! Errors raised by the collaborators around the core: reading exports from
//! disk and rendering the annotated graph.

use thiserror::Error;

/// Import and export operation errors
#[derive(Error, Debug)]
pub enum ImportExportError {
    /// File extension is not one we can load
    #[error("Unsupported extension: {0}")]
    UnsupportedExtension(String),

    /// Input file carries no header row
    #[error("Missing header row in {0}")]
    MissingHeader(String),

    /// CSV parsing/writing error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Template rendering failed
    #[error("Template rendering failed: {0}")]
    TemplateError(String),

    /// Unknown built-in template
    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendered output is not valid UTF-8
    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl From<handlebars::RenderError> for ImportExportError {
    fn from(err: handlebars::RenderError) -> Self {
        ImportExportError::TemplateError(err.to_string())
    }
}

impl From<handlebars::TemplateError> for ImportExportError {
    fn from(err: handlebars::TemplateError) -> Self {
        ImportExportError::TemplateError(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for ImportExportError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ImportExportError::EncodingError(err.to_string())
    }
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for ImportExportError {
    fn from(err: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        ImportExportError::Io(err.into_error())
    }
}

impl ImportExportError {
    /// Check if the caller supplied something we cannot handle
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImportExportError::UnsupportedExtension(_)
                | ImportExportError::MissingHeader(_)
                | ImportExportError::TemplateNotFound(_)
        )
    }

    /// Get error code for reports
    pub fn error_code(&self) -> &'static str {
        match self {
            ImportExportError::UnsupportedExtension(_) | ImportExportError::MissingHeader(_) => {
                "INVALID_INPUT"
            }
            ImportExportError::CsvError(_) => "CSV_ERROR",
            ImportExportError::SerializationError(_) => "SERIALIZATION_ERROR",
            ImportExportError::TemplateError(_) | ImportExportError::TemplateNotFound(_) => {
                "TEMPLATE_ERROR"
            }
            ImportExportError::Io(_) => "IO_ERROR",
            ImportExportError::EncodingError(_) => "ENCODING_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension() {
        let err = ImportExportError::UnsupportedExtension("xlsx".to_string());
        assert_eq!(err.to_string(), "Unsupported extension: xlsx");
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_template_not_found() {
        let err = ImportExportError::TemplateNotFound("mermaid".to_string());
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "TEMPLATE_ERROR");
    }
}
