//! Embedding model seam.
//!
//! The generator receives its model at construction time; nothing here is a
//! process-wide singleton. Models are synchronous and may be CPU-heavy, so
//! callers run them on the blocking pool.

use matchmaker_core::{MatchError, MatchResult};
use std::collections::HashMap;

pub trait EmbeddingModel: Send + Sync {
    /// Encode `text` into a fixed-length vector. Deterministic for a given model.
    fn encode(&self, text: &str) -> MatchResult<Vec<f32>>;

    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// Feature-hashing encoder.
///
/// Hashes unigrams and adjacent-word bigrams into a fixed number of buckets
/// (FNV-1a), weights them by term frequency and L2-normalizes the result.
/// Always available and fully deterministic.
pub struct HashingEncoder {
    dimensions: usize,
}

impl HashingEncoder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= u64::from(*b);
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % dims as u64) as usize
    }
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingModel for HashingEncoder {
    fn encode(&self, text: &str) -> MatchResult<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(MatchError::Embedding("encoder has zero dimensions".into()));
        }

        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(MatchError::Embedding("cannot encode empty text".into()));
        }

        let mut tf: HashMap<String, f32> = HashMap::new();
        for tok in &tokens {
            *tf.entry((*tok).to_string()).or_default() += 1.0;
        }
        // Bigrams carry half the weight of single words.
        for pair in tokens.windows(2) {
            *tf.entry(format!("{} {}", pair[0], pair[1])).or_default() += 0.5;
        }

        let mut vec = vec![0.0f32; self.dimensions];
        for (term, weight) in &tf {
            vec[Self::bucket(term, self.dimensions)] += weight;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        Ok(vec)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[test]
    fn test_fixed_length_and_normalized() {
        let encoder = HashingEncoder::default();
        let v = encoder.encode("hike mountain coffee").unwrap();
        assert_eq!(v.len(), 384);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic() {
        let encoder = HashingEncoder::new(64);
        assert_eq!(
            encoder.encode("jazz vinyl").unwrap(),
            encoder.encode("jazz vinyl").unwrap()
        );
    }

    #[test]
    fn test_overlap_scores_higher() {
        let encoder = HashingEncoder::default();
        let me = encoder.encode("hike mountain travel photography").unwrap();
        let close = encoder.encode("mountain hike photography").unwrap();
        let far = encoder.encode("opera ballet theatre").unwrap();
        assert!(cosine_similarity(&me, &close) > cosine_similarity(&me, &far));
    }

    #[test]
    fn test_empty_text_is_an_error() {
        assert!(matches!(
            HashingEncoder::default().encode("   "),
            Err(MatchError::Embedding(_))
        ));
    }
}
