use super::Embedding;

/// Distance measures between embedding vectors.
pub trait VectorDistance {
    /// Get dot product of two embedding vectors.
    fn dot_product(&self, other: &Self) -> f64;

    /// Get cosine similarity of two embedding vectors.
    /// If `normalized` is true, the dot product is returned.
    fn cosine_similarity(&self, other: &Self, normalized: bool) -> f64;
}

impl VectorDistance for Embedding {
    fn dot_product(&self, other: &Self) -> f64 {
        self.vec
            .iter()
            .zip(other.vec.iter())
            .map(|(x, y)| x * y)
            .sum()
    }

    fn cosine_similarity(&self, other: &Self, normalized: bool) -> f64 {
        let dot_product = self.dot_product(other);
        if normalized {
            return dot_product;
        }

        let magnitude1 = self.vec.iter().map(|x| x.powi(2)).sum::<f64>().sqrt();
        let magnitude2 = other.vec.iter().map(|x| x.powi(2)).sum::<f64>().sqrt();
        let magnitude = magnitude1 * magnitude2;
        if magnitude == 0.0 {
            0.0
        } else {
            dot_product / magnitude
        }
    }
}
