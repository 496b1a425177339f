use std::io;
use std::path::PathBuf;

use crate::format::Format;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unrecognized archive or compression format")]
    UnrecognizedFormat,

    #[error("failed to open {format} stream: {source}")]
    FormatOpen { format: Format, source: BoxError },

    #[error("member not found: '{0}'")]
    MemberNotFound(String),

    #[error("member destination is outside the target directory: '{member}' resolves to '{resolved}'")]
    UnsafeMember { member: String, resolved: PathBuf },

    #[error("invalid extraction mode '{0}', expected 'safe' or 'insecure'")]
    InvalidExtractionMode(String),

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("failed to create symlink: {source}")]
    SymlinkCreationFailed {
        target: PathBuf,
        link: PathBuf,
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn open(format: Format, source: impl Into<BoxError>) -> Self {
        Self::FormatOpen {
            format,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_format_has_no_detail() {
        assert_eq!(
            Error::UnrecognizedFormat.to_string(),
            "unrecognized archive or compression format"
        );
    }

    #[test]
    fn format_open_names_the_format() {
        let err = Error::open(Format::Bzip2, "bad block");
        assert_eq!(err.to_string(), "failed to open bzip2 stream: bad block");
    }
}
