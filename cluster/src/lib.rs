//! Identity clustering for face embeddings.
//!
//! Embeddings are L2-normalized ([`normalize`]) and grouped with DBSCAN over
//! cosine distance using `min_samples = 1` ([`cluster`]). With that setting
//! every point is a core point, so no embedding is ever rejected as noise:
//! a face with no similar neighbor forms its own singleton cluster.
//!
//! # Usage
//!
//! ```
//! use facesort_cluster::Clusterer;
//!
//! let embeddings = vec![
//!     vec![1.0, 0.0, 0.0],
//!     vec![0.99, 0.1, 0.0],
//!     vec![0.0, 0.0, 1.0],
//! ];
//! let labels = Clusterer::default().cluster(&embeddings).unwrap();
//! assert_eq!(labels, vec![0, 0, 1]);
//! ```
//!
//! # Determinism
//!
//! Points are visited in input order and each cluster is expanded
//! breadth-first in ascending index order. Labels are dense, start at 0 and
//! follow the order in which each cluster's lowest-index member appears, so
//! identical input always yields identical labels.

mod dbscan;
mod error;
mod normalize;

pub use dbscan::{cluster, group_by_label, Clusterer, DEFAULT_EPS};
pub use error::ClusterError;
pub use normalize::{l2_normalize, normalize};
