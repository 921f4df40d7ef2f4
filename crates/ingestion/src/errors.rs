//! Ingestion error types

use papermind_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {filename}: {message}")]
    PdfParse { filename: String, message: String },

    #[error("No extractable text in {filename}")]
    EmptyDocument { filename: String },

    #[error(transparent)]
    Pipeline(#[from] AppError),
}

impl IngestionError {
    /// Whether the document itself is at fault rather than a collaborator
    pub fn is_document_error(&self) -> bool {
        !matches!(self, IngestionError::Pipeline(_))
    }
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::PdfParse { filename, message } => {
                AppError::Extraction { filename, message }
            }
            IngestionError::EmptyDocument { filename } => AppError::Extraction {
                filename,
                message: "document has no pages with extractable text".to_string(),
            },
            IngestionError::Pipeline(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papermind_common::errors::ErrorCode;

    #[test]
    fn test_document_errors_map_to_extraction() {
        let err: AppError = IngestionError::EmptyDocument {
            filename: "blank.pdf".into(),
        }
        .into();
        assert!(matches!(err, AppError::Extraction { ref filename, .. } if filename == "blank.pdf"));
    }

    #[test]
    fn test_every_document_error_is_an_extraction_failure() {
        let errors = [
            IngestionError::PdfParse {
                filename: "broken.pdf".into(),
                message: "truncated xref".into(),
            },
            IngestionError::EmptyDocument {
                filename: "blank.pdf".into(),
            },
        ];
        for err in errors {
            assert!(err.is_document_error());
            let mapped = AppError::from(err);
            assert_eq!(mapped.code(), ErrorCode::ExtractionFailed);
        }
    }

    #[test]
    fn test_pipeline_errors_pass_through() {
        let err = IngestionError::from(AppError::Store {
            message: "down".into(),
        });
        assert!(!err.is_document_error());
        assert!(matches!(AppError::from(err), AppError::Store { .. }));
    }
}
