use thiserror::Error;

/// Errors returned by normalization and clustering.
///
/// All of these abort the current run only; they never describe a
/// single bad image that could be skipped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusterError {
    #[error("cluster: dimension mismatch at vector {index}: expected {expected}, got {got}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("cluster: degenerate vector at index {index} (zero or non-finite norm)")]
    DegenerateVector { index: usize },

    #[error("cluster: eps must be a finite cosine distance in [0, 2], got {0}")]
    InvalidEps(f32),
}
