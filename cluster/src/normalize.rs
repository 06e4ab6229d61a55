use crate::ClusterError;

/// Rescales a vector to unit Euclidean norm in-place.
///
/// Accumulates in f64. Returns `false` and leaves the vector untouched when
/// its norm is zero or not finite, since such a vector has no direction.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let mut sum: f64 = 0.0;
    for &x in v.iter() {
        sum += (x as f64) * (x as f64);
    }
    let norm = sum.sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    let scale = 1.0 / norm;
    for x in v.iter_mut() {
        *x = ((*x as f64) * scale) as f32;
    }
    true
}

/// Returns a unit-length copy of every vector.
///
/// All vectors must share the dimension of the first one. A zero (or
/// non-finite) vector fails the whole batch with
/// [`ClusterError::DegenerateVector`] instead of producing NaNs that would
/// poison every distance computed against it.
pub fn normalize(vectors: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, ClusterError> {
    let Some(first) = vectors.first() else {
        return Ok(Vec::new());
    };
    let dim = first.len();

    let mut out = Vec::with_capacity(vectors.len());
    for (index, v) in vectors.iter().enumerate() {
        if v.len() != dim {
            return Err(ClusterError::DimensionMismatch {
                index,
                expected: dim,
                got: v.len(),
            });
        }
        let mut cp = v.clone();
        if !l2_normalize(&mut cp) {
            return Err(ClusterError::DegenerateVector { index });
        }
        out.push(cp);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f64 {
        v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
    }

    #[test]
    fn l2_normalize_unit() {
        let mut v = [3.0, 4.0];
        assert!(l2_normalize(&mut v));
        assert!((norm(&v) - 1.0).abs() < 1e-6, "should be unit length");
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_zero_is_rejected() {
        let mut v = [0.0, 0.0, 0.0];
        assert!(!l2_normalize(&mut v));
        assert_eq!(v, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn l2_normalize_nan_is_rejected() {
        let mut v = [f32::NAN, 1.0];
        assert!(!l2_normalize(&mut v));
    }

    #[test]
    fn normalize_batch() {
        let out = normalize(&[vec![10.0, 0.0], vec![1.0, 1.0]]).unwrap();
        assert_eq!(out.len(), 2);
        for v in &out {
            assert!((norm(v) - 1.0).abs() < 1e-6);
        }
        assert!((out[0][0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_empty() {
        assert!(normalize(&[]).unwrap().is_empty());
    }

    #[test]
    fn normalize_reports_degenerate_index() {
        let err = normalize(&[vec![1.0, 0.0], vec![0.0, 0.0], vec![0.0, 1.0]]).unwrap_err();
        assert_eq!(err, ClusterError::DegenerateVector { index: 1 });
    }

    #[test]
    fn normalize_reports_dimension_mismatch() {
        let err = normalize(&[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]).unwrap_err();
        assert_eq!(
            err,
            ClusterError::DimensionMismatch {
                index: 1,
                expected: 2,
                got: 3
            }
        );
    }
}
