//! Vector math over embeddings.
//!
//! Degenerate inputs (all-zero, NaN or infinite components) never produce NaN:
//! `normalize` yields zeros and `cosine_similarity` yields `0.0`.

use crate::error::{Result, VisionError};

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[inline]
fn degenerate(norm: f32) -> bool {
    norm == 0.0 || !norm.is_finite()
}

/// Scale `v` to unit length, clamping each component to `[-1, 1]`.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if degenerate(norm) {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| (x / norm).clamp(-1.0, 1.0)).collect()
}

/// Cosine of the angle between `a` and `b`, in `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(VisionError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (norm_a, norm_b) = (l2_norm(a), l2_norm(b));
    if degenerate(norm_a) || degenerate(norm_b) {
        return Ok(0.0);
    }

    let cos = dot(a, b) / (norm_a * norm_b);
    if cos.is_nan() {
        return Ok(0.0);
    }
    Ok(cos.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn pseudo_random(len: usize, seed: u32) -> Vec<f32> {
        let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 2000) as f32 / 1000.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_normalize_three_four() {
        let n = normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < EPS);
        assert!((n[1] - 0.8).abs() < EPS);
    }

    #[test]
    fn test_normalize_unit_length() {
        for seed in 0..20 {
            let v = pseudo_random(512, seed);
            let n = normalize(&v);
            assert_eq!(n.len(), 512);
            assert!((l2_norm(&n) - 1.0).abs() < 1e-4);
            assert!(n.iter().all(|x| (-1.0..=1.0).contains(x)));
        }
    }

    #[test]
    fn test_normalize_degenerate() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![0.0; 3]);
        assert_eq!(normalize(&[1.0, f32::NAN]), vec![0.0; 2]);
        assert_eq!(normalize(&[f32::INFINITY, 1.0]), vec![0.0; 2]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_normalize_keeps_direction() {
        let n = normalize(&[3.0, 4.0, 0.0]);
        assert!(n[0] > 0.0 && n[1] > 0.0);
        assert_eq!(n[2], 0.0);
    }

    #[test]
    fn test_cosine_identical_opposite_orthogonal() {
        let a = [1.0, 2.0, 3.0];
        let neg: Vec<f32> = a.iter().map(|x| -x).collect();
        assert!((cosine_similarity(&a, &a).unwrap() - 1.0).abs() < EPS);
        assert!((cosine_similarity(&a, &neg).unwrap() + 1.0).abs() < EPS);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < EPS);
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let a = pseudo_random(64, 7);
        for k in [0.001_f32, 0.5, 2.0, 1000.0] {
            let scaled: Vec<f32> = a.iter().map(|x| x * k).collect();
            assert!((cosine_similarity(&a, &scaled).unwrap() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cosine_symmetric() {
        for seed in 0..20 {
            let a = pseudo_random(128, seed);
            let b = pseudo_random(128, seed + 100);
            let ab = cosine_similarity(&a, &b).unwrap();
            let ba = cosine_similarity(&b, &a).unwrap();
            assert!((ab - ba).abs() < EPS);
            assert!((-1.0..=1.0).contains(&ab));
        }
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        let a = vec![0.1; 512];
        let b = vec![0.1; 511];
        let err = cosine_similarity(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            VisionError::DimensionMismatch {
                expected: 512,
                actual: 511
            }
        ));
        assert!(cosine_similarity(&b, &a).is_err());
    }
}
