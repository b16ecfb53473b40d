use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Fatal conditions for a batch run. Per-sheet failures are
/// [`SheetError`] and never abort the batch.
#[derive(Debug)]
pub enum Error {
    AnswerKeyIo { path: PathBuf, source: io::Error },
    AnswerKeyFormat { path: PathBuf, message: String },
    SheetDirIo { path: PathBuf, source: io::Error },
    EmptyBatch,
    OutputIo { path: PathBuf, source: io::Error },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnswerKeyIo { path, .. } => {
                write!(f, "failed to read answer key {}", path.display())
            }
            Self::AnswerKeyFormat { path, message } => {
                write!(f, "invalid answer key {}: {}", path.display(), message)
            }
            Self::SheetDirIo { path, .. } => {
                write!(f, "failed to read sheet directory {}", path.display())
            }
            Self::EmptyBatch => {
                write!(f, "no sheet in the batch produced a response map")
            }
            Self::OutputIo { path, .. } => {
                write!(f, "failed to write output {}", path.display())
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::AnswerKeyIo { source, .. }
            | Self::SheetDirIo { source, .. }
            | Self::OutputIo { source, .. } => Some(source),
            Self::AnswerKeyFormat { .. } | Self::EmptyBatch => None,
        }
    }
}

/// A failure confined to a single sheet; the sheet is skipped with a
/// diagnostic and the rest of the batch continues.
#[derive(Debug)]
pub enum SheetError {
    ImageOpen {
        path: PathBuf,
        source: image::ImageError,
    },
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageOpen { path, source } => {
                write!(f, "failed to open sheet image {}: {}", path.display(), source)
            }
        }
    }
}

impl error::Error for SheetError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::ImageOpen { source, .. } => Some(source),
        }
    }
}
