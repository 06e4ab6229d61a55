use std::collections::VecDeque;

use crate::normalize::normalize;
use crate::ClusterError;

/// Default neighborhood radius in cosine-distance units.
pub const DEFAULT_EPS: f32 = 0.5;

/// DBSCAN over cosine distance with `min_samples = 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clusterer {
    eps: f32,
}

impl Clusterer {
    /// Creates a clusterer with the given neighborhood radius.
    pub fn new(eps: f32) -> Result<Self, ClusterError> {
        validate_eps(eps)?;
        Ok(Self { eps })
    }

    pub fn eps(&self) -> f32 {
        self.eps
    }

    /// Assigns one label per vector, in input order. See [`cluster`].
    pub fn cluster(&self, vectors: &[Vec<f32>]) -> Result<Vec<usize>, ClusterError> {
        cluster(vectors, self.eps)
    }
}

impl Default for Clusterer {
    fn default() -> Self {
        Self { eps: DEFAULT_EPS }
    }
}

/// Runs DBSCAN using cosine distance and a minimum group size of 1.
///
/// # Parameters
/// - `vectors`: raw embeddings; they are L2-normalized internally
/// - `eps`: maximum cosine distance (1 - cosine_similarity) for neighbors
///
/// # Returns
/// One label per vector. Labels are dense, start at 0, and are numbered in
/// the order each cluster's first member appears in the input. Every vector
/// is labeled; an isolated vector becomes a singleton cluster.
pub fn cluster(vectors: &[Vec<f32>], eps: f32) -> Result<Vec<usize>, ClusterError> {
    validate_eps(eps)?;
    let normed = normalize(vectors)?;
    let n = normed.len();

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut next_label = 0usize;

    for i in 0..n {
        if labels[i].is_some() {
            continue;
        }

        // With min_samples = 1 every point is core, so each unvisited point
        // starts a cluster and expansion reaches its whole eps-connected component.
        let label = next_label;
        next_label += 1;
        labels[i] = Some(label);

        let mut seed = VecDeque::from([i]);
        while let Some(q) = seed.pop_front() {
            for j in range_query(&normed, q, eps) {
                if labels[j].is_none() {
                    labels[j] = Some(label);
                    seed.push_back(j);
                }
            }
        }
    }

    Ok(labels.into_iter().flatten().collect())
}

/// Groups input indices by label. `groups[label]` lists the indices carrying
/// that label in ascending order.
pub fn group_by_label(labels: &[usize]) -> Vec<Vec<usize>> {
    let count = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut groups = vec![Vec::new(); count];
    for (i, &l) in labels.iter().enumerate() {
        groups[l].push(i);
    }
    groups
}

/// Returns indices of all vectors within eps cosine distance of vectors[idx],
/// in ascending order.
///
/// Linear scan. Vectors are already unit length, so the distance reduces
/// to `1 - dot`.
fn range_query(vectors: &[Vec<f32>], idx: usize, eps: f32) -> Vec<usize> {
    let q = &vectors[idx];
    vectors
        .iter()
        .enumerate()
        .filter(|(_, v)| unit_distance(q, v) <= eps)
        .map(|(i, _)| i)
        .collect()
}

fn unit_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot: f64 = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        dot += (x as f64) * (y as f64);
    }
    (1.0 - dot.clamp(-1.0, 1.0)) as f32
}

fn validate_eps(eps: f32) -> Result<(), ClusterError> {
    if !eps.is_finite() || !(0.0..=2.0).contains(&eps) {
        return Err(ClusterError::InvalidEps(eps));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit vector in the xy-plane at the given cosine distance from [1, 0, 0].
    fn at_distance(d: f32) -> Vec<f32> {
        let c = 1.0 - d;
        vec![c, (1.0f32 - c * c).sqrt(), 0.0]
    }

    fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
        1.0 - dot / (norm(a) * norm(b))
    }

    #[test]
    fn distance_equal_to_eps_is_a_neighbor() {
        // Orthogonal unit vectors are exactly 1.0 apart.
        let pair = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(cluster(&pair, 1.0).unwrap(), vec![0, 0]);
        assert_eq!(cluster(&pair, 0.999).unwrap(), vec![0, 1]);

        // Antipodal vectors are exactly 2.0 apart, the largest valid eps.
        let opposite = vec![vec![1.0, 0.0], vec![-1.0, 0.0]];
        assert_eq!(cluster(&opposite, 2.0).unwrap(), vec![0, 0]);
    }

    #[test]
    fn distance_just_above_eps_is_not_a_neighbor() {
        let pair = vec![vec![1.0, 0.0], vec![-0.01, 1.0]];
        assert!(cosine_distance(&pair[0], &pair[1]) > 1.0);
        assert_eq!(cluster(&pair, 1.0).unwrap(), vec![0, 1]);
    }

    #[test]
    fn empty_input() {
        assert!(cluster(&[], DEFAULT_EPS).unwrap().is_empty());
    }

    #[test]
    fn single_vector_is_its_own_cluster() {
        assert_eq!(cluster(&[vec![0.3, 0.4, 0.5]], DEFAULT_EPS).unwrap(), vec![0]);
    }

    #[test]
    fn close_pair_and_distant_point() {
        let a = vec![1.0, 0.0, 0.0];
        let b = at_distance(0.1);
        let c = vec![0.0, 0.0, 1.0];
        assert!((cosine_distance(&a, &b) - 0.1).abs() < 1e-4);

        let labels = cluster(&[a, b, c], DEFAULT_EPS).unwrap();
        assert_eq!(labels, vec![0, 0, 1]);
    }

    #[test]
    fn no_noise_with_min_samples_one() {
        // Mutually orthogonal: nobody has a neighbor, everybody is labeled.
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        assert_eq!(cluster(&vectors, DEFAULT_EPS).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn transitive_chain_merges() {
        // a~b and b~c within eps, but a and c are farther apart than eps.
        let a = vec![1.0, 0.0, 0.0];
        let b = at_distance(0.3);
        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_distance(&a, &c) > 0.5);
        assert!(cosine_distance(&b, &c) <= 0.5);

        let labels = cluster(&[a, c, b], DEFAULT_EPS).unwrap();
        assert_eq!(labels, vec![0, 0, 0]);
    }

    #[test]
    fn labels_follow_first_appearance() {
        let x = vec![0.0, 0.0, 1.0];
        let y = vec![1.0, 0.0, 0.0];
        let labels = cluster(&[x.clone(), y.clone(), x, y], DEFAULT_EPS).unwrap();
        assert_eq!(labels, vec![0, 1, 0, 1]);
    }

    #[test]
    fn deterministic_across_runs() {
        let vectors: Vec<Vec<f32>> = (0..40)
            .map(|i| {
                let t = i as f32 * 0.37;
                vec![t.cos(), t.sin(), (i % 3) as f32 * 0.2]
            })
            .collect();
        let first = cluster(&vectors, 0.05).unwrap();
        for _ in 0..5 {
            assert_eq!(cluster(&vectors, 0.05).unwrap(), first);
        }
        assert_eq!(first.len(), vectors.len());
    }

    #[test]
    fn magnitude_is_ignored() {
        let labels = cluster(&[vec![5.0, 0.0], vec![0.01, 0.0]], 0.01).unwrap();
        assert_eq!(labels, vec![0, 0]);
    }

    #[test]
    fn dimension_mismatch() {
        let err = cluster(&[vec![1.0, 0.0], vec![1.0]], DEFAULT_EPS).unwrap_err();
        assert!(matches!(err, ClusterError::DimensionMismatch { index: 1, .. }));
    }

    #[test]
    fn degenerate_vector() {
        let err = cluster(&[vec![1.0, 0.0], vec![0.0, 0.0]], DEFAULT_EPS).unwrap_err();
        assert_eq!(err, ClusterError::DegenerateVector { index: 1 });
    }

    #[test]
    fn invalid_eps() {
        assert!(Clusterer::new(-0.1).is_err());
        assert!(Clusterer::new(f32::NAN).is_err());
        assert!(Clusterer::new(2.5).is_err());
        assert_eq!(Clusterer::new(0.3).unwrap().eps(), 0.3);
        assert_eq!(Clusterer::default().eps(), DEFAULT_EPS);
    }

    #[test]
    fn group_by_label_inverts_labels() {
        let groups = group_by_label(&[0, 1, 0, 2]);
        assert_eq!(groups, vec![vec![0, 2], vec![1], vec![3]]);
        assert!(group_by_label(&[]).is_empty());
    }
}
