use facesort_album::AlbumError;
use facesort_cluster::ClusterError;
use thiserror::Error;

use crate::report::SkippedImage;

#[derive(Error, Debug)]
pub enum ProcessError {
    /// No image yielded a usable embedding. Carries why each one was skipped.
    #[error("process: no valid face embeddings found ({} images skipped)", skipped.len())]
    NoValidInput { skipped: Vec<SkippedImage> },

    #[error("process: invalid tenant key {key:?}: {reason}")]
    InvalidTenantKey { key: String, reason: &'static str },

    #[error("process: {0}")]
    Cluster(#[from] ClusterError),

    #[error("process: {0}")]
    Storage(AlbumError),
}

impl ProcessError {
    /// Short machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessError::NoValidInput { .. } => "no_valid_input",
            ProcessError::InvalidTenantKey { .. } => "invalid_tenant",
            ProcessError::Cluster(_) => "cluster",
            ProcessError::Storage(_) => "storage",
        }
    }
}

impl From<AlbumError> for ProcessError {
    fn from(e: AlbumError) -> Self {
        match e {
            AlbumError::InvalidTenantKey { key, reason } => {
                ProcessError::InvalidTenantKey { key, reason }
            }
            other => ProcessError::Storage(other),
        }
    }
}
