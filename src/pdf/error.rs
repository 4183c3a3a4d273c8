use std::{io, path::PathBuf};

/// Errors raised while assembling an output PDF.
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("no input files to process")]
    NoInputs,

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to load PDF {}: {reason}", path.display())]
    FailedToLoad { path: PathBuf, reason: String },

    #[error("{} is not a supported image: {reason}", path.display())]
    UnsupportedImage { path: PathBuf, reason: String },

    #[error("PDF structure error: {0}")]
    Structure(#[from] lopdf::Error),

    #[error("failed to write output: {0}")]
    Write(#[from] io::Error),
}

impl PdfError {
    pub fn unsupported_image(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedImage {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type PdfResult<T> = Result<T, PdfError>;
