//! Shared error taxonomy used by every layer of the archive pipeline.

use thiserror::Error;

/// Errors that can occur anywhere in the archive pipeline.
///
/// `NotFound`, `WrongType` and `BufTooSmall` are recoverable (a caller may
/// fall back to a default); everything else is fatal for the operation in
/// progress.
#[derive(Debug, Error)]
pub enum Error {
    #[error("end of queue")]
    EndOfQueue,

    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("attribute (section={section:?}, key={key}) not found")]
    NotFound { section: u8, key: u16 },

    #[error("attribute (section={section:?}, key={key}) has the wrong type")]
    WrongType { section: u8, key: u16 },

    #[error("buffer too small for attribute (section={section:?}, key={key})")]
    BufTooSmall { section: u8, key: u16 },

    #[error("duplicate attribute (section={section:?}, key={key})")]
    Duplicate { section: u8, key: u16 },

    #[error("resource is not open")]
    NotOpen,

    #[error("no space left on device (need {needed} bytes, {free} free)")]
    NoSpace { needed: u64, free: u64 },

    #[error("seek failed: {0}")]
    Seek(#[source] std::io::Error),

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("incorrect password")]
    Password,

    #[error("archive requires a reader with minimum version {required}, this build is {actual}")]
    UnsupportedFeature { required: u32, actual: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
