use std::io::Error as IoError;
use std::path::PathBuf;

use err_derive::Error;

#[derive(Debug, Error)]
pub enum MpqError {
    #[error(display = "No header found")]
    NoHeader,
    #[error(display = "IO Error: {}", cause)]
    IoError { cause: IoError },
    #[error(display = "IO Error on {:?}: {}", path, cause)]
    FileIoError { path: PathBuf, cause: IoError },
    #[error(display = "Unsupported MPQ version")]
    UnsupportedVersion,
    #[error(display = "Corrupted archive: {}", reason)]
    Corrupted { reason: String },
    #[error(display = "File not found: {}", name)]
    FileNotFound { name: String },
    #[error(display = "Unknown compression type: {:#04x}", id)]
    UnknownCompression { id: u8 },
    #[error(display = "Compression type unsupported: {}", kind)]
    UnsupportedCompression { kind: String },
    #[error(display = "Invalid sector size: {}", size)]
    InvalidSectorSize { size: u64 },
    #[error(display = "Archive has already been written")]
    AlreadyFinalized,
}

impl From<IoError> for MpqError {
    fn from(other: IoError) -> Self {
        MpqError::IoError { cause: other }
    }
}

impl MpqError {
    pub(crate) fn corrupted<S: Into<String>>(reason: S) -> MpqError {
        MpqError::Corrupted {
            reason: reason.into(),
        }
    }

    pub(crate) fn file_io<P: Into<PathBuf>>(path: P, cause: IoError) -> MpqError {
        MpqError::FileIoError {
            path: path.into(),
            cause,
        }
    }
}
