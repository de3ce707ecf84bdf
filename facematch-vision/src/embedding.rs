use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::vector;

/// L2-normalized face embedding.
///
/// Only built through [`Embedding::normalize`], so every instance has unit
/// length (or is all zeros for degenerate input) and components in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding {
    vector: Vec<f32>,
}

impl Embedding {
    pub fn normalize(raw: &[f32]) -> Self {
        let vector = vector::normalize(raw);
        if !raw.is_empty() && vector.iter().all(|v| *v == 0.0) {
            warn!("degenerate embedding of dimension {}", raw.len());
        }
        Self { vector }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    pub fn is_zero(&self) -> bool {
        self.vector.iter().all(|v| *v == 0.0)
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.vector
    }

    /// Cosine similarity against `other`. Fails on dimension mismatch.
    pub fn similarity(&self, other: &Embedding) -> Result<f32> {
        vector::cosine_similarity(&self.vector, &other.vector)
    }
}

// Stored vectors are normalized again on the way in.
impl From<Vec<f32>> for Embedding {
    fn from(raw: Vec<f32>) -> Self {
        Embedding::normalize(&raw)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(e: Embedding) -> Self {
        e.vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_on_construction() {
        let e = Embedding::normalize(&[3.0, 4.0]);
        assert_eq!(e.dim(), 2);
        assert!((e.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((e.as_slice()[1] - 0.8).abs() < 1e-6);
        assert!(!e.is_zero());
    }

    #[test]
    fn test_from_vec_renormalizes() {
        let e = Embedding::from(vec![0.0, 10.0]);
        assert_eq!(e.as_slice(), &[0.0f32, 1.0][..]);
        assert!(Embedding::from(vec![0.0; 4]).is_zero());
    }

    #[test]
    fn test_similarity() {
        let a = Embedding::normalize(&[1.0, 0.0]);
        let b = Embedding::normalize(&[0.0, 1.0]);
        assert!(a.similarity(&b).unwrap().abs() < 1e-6);
        assert!((a.similarity(&a).unwrap() - 1.0).abs() < 1e-6);
        assert!(a.similarity(&Embedding::normalize(&[1.0, 0.0, 0.0])).is_err());
    }
}
