//! `fsarc-core`'s error type: the shared taxonomy of [`fsarc_dtyp::Error`],
//! extended with variants for failures that only make sense at this layer
//! (a mount/mkfs adapter call, a filesystem syscall during restore).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] fsarc_dtyp::Error),

    #[error("filesystem adapter error: {0}")]
    Fs(String),

    #[error("no adapter registered for {0:?} (pass -x to select an experimental one)")]
    NoAdapter(fsarc_fs::FsFamily),

    #[error("run aborted by signal")]
    Aborted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for fsarc_dtyp::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Core(e) => e,
            Error::Fs(msg) => fsarc_dtyp::Error::InvalidArg(msg),
            Error::NoAdapter(family) => fsarc_dtyp::Error::InvalidArg(format!("no adapter for {family}")),
            Error::Aborted => fsarc_dtyp::Error::InvalidArg("aborted".into()),
            Error::Io(e) => fsarc_dtyp::Error::Io(e),
        }
    }
}
