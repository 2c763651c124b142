//! Dense vector type and similarity math.

use serde::{Deserialize, Serialize};

/// A dense embedding vector.
///
/// Vectors returned by the embedding service are L2-normalized, so cosine
/// similarity reduces to a dot product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector(Vec<f32>);

impl Vector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub fn l2_norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Scale to unit length. Zero vectors stay zero.
    pub fn l2_normalized(mut self) -> Self {
        let norm = self.l2_norm();
        if norm > f32::EPSILON {
            for value in &mut self.0 {
                *value /= norm;
            }
        }
        self
    }

    /// Dot product; dimensions must match (shorter tail treated as zero).
    pub fn dot(&self, other: &Self) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Cosine similarity in [-1, 1]; zero when either vector is zero.
    pub fn cosine(&self, other: &Self) -> f32 {
        let denom = self.l2_norm() * other.l2_norm();
        if denom <= f32::EPSILON {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(-1.0, 1.0)
    }
}

impl From<Vec<f32>> for Vector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_l2_normalized_is_unit_length() {
        let vector = Vector::new(vec![3.0, 4.0]).l2_normalized();
        assert!((vector.l2_norm() - 1.0).abs() < 1e-6);
        assert!((vector.as_slice()[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_stays_zero() {
        let vector = Vector::new(vec![0.0, 0.0]).l2_normalized();
        assert_eq!(vector.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_cosine_bounds() {
        let a = Vector::new(vec![1.0, 0.0]);
        let b = Vector::new(vec![1.0, 0.0]);
        let c = Vector::new(vec![-1.0, 0.0]);
        let zero = Vector::new(vec![0.0, 0.0]);
        assert!((a.cosine(&b) - 1.0).abs() < 1e-6);
        assert!((a.cosine(&c) + 1.0).abs() < 1e-6);
        assert_eq!(a.cosine(&zero), 0.0);
    }

    #[test]
    fn test_dot_equals_cosine_for_unit_vectors() {
        let a = Vector::new(vec![0.2, 0.5, 0.9]).l2_normalized();
        let b = Vector::new(vec![0.7, 0.1, 0.4]).l2_normalized();
        assert!((a.dot(&b) - a.cosine(&b)).abs() < 1e-6);
    }
}
