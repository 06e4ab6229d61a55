use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlbumError {
    #[error("album: invalid tenant key {key:?}: {reason}")]
    InvalidTenantKey { key: String, reason: &'static str },

    #[error("album: invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The image reference does not point into the tenant's intake area.
    #[error("album: image {} does not belong to tenant {tenant:?}", path.display())]
    ForeignImage { tenant: String, path: PathBuf },

    #[error("album: not found: {0}")]
    NotFound(String),

    #[error("album: storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AlbumError {
    pub(crate) fn storage(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| AlbumError::Storage { path, source }
    }
}
