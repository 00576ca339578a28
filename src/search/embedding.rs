//! Deterministic text embeddings via harmonic token projection.
//!
//! Based on "Harmonic Token Projection: A Vocabulary-Free, Training-Free,
//! Deterministic, and Reversible Embedding Methodology"
//! (https://arxiv.org/html/2511.20665). Each token is encoded as an integer
//! over its Unicode code points, reduced modulo a fixed set of primes, and
//! projected onto the unit circle per modulus; token vectors are mean-pooled
//! and L2-normalized.
//!
//! The same transformation embeds corpus documents and queries, so both
//! always live in the same embedding space — the consistency invariant the
//! semantic index depends on. No model file, no network, same input always
//! yields the same vector.

use std::f64::consts::PI;

use thiserror::Error;

/// Embedding dimension: two components (sin, cos) per modulus.
pub const EMBEDDING_DIM: usize = 384;

const NUM_MODULI: usize = EMBEDDING_DIM / 2;

/// Longest token prefix considered when encoding, in code points.
const MAX_TOKEN_LENGTH: usize = 64;

/// First 192 primes, pairwise coprime by construction.
static MODULI: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293,
    307, 311, 313, 317, 331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503, 509, 521, 523, 541,
    547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607, 613, 617, 619, 631, 641, 643, 647, 653,
    659, 661, 673, 677, 683, 691, 701, 709, 719, 727, 733, 739, 743, 751, 757, 761, 769, 773, 787,
    797, 809, 811, 821, 823, 827, 829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911, 919,
    929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997, 1009, 1013, 1019, 1021, 1031, 1033,
    1039, 1049, 1051, 1061, 1063, 1069, 1087, 1091, 1093, 1097, 1103, 1109, 1117, 1123, 1129,
    1151, 1153, 1163, 1171, 1181,
];

/// Errors surfaced while embedding text.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding produced wrong dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Stateless harmonic-projection embedder.
#[derive(Debug, Clone, Default)]
pub struct Embedder;

impl Embedder {
    pub fn new() -> Self {
        Self
    }

    /// Embed a text into a unit-norm `EMBEDDING_DIM` vector. Empty or
    /// tokenless text maps to the zero vector.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Ok(vec![0.0; EMBEDDING_DIM]);
        }

        let mut sum = vec![0.0f64; EMBEDDING_DIM];
        for token in &tokens {
            let n = token_to_integer(token);
            for (slot, &modulus) in MODULI[..NUM_MODULI].iter().enumerate() {
                let remainder = n % modulus;
                let theta = 2.0 * PI * (remainder as f64) / (modulus as f64);
                sum[2 * slot] += theta.sin();
                sum[2 * slot + 1] += theta.cos();
            }
        }

        let count = tokens.len() as f64;
        for value in &mut sum {
            *value /= count;
        }

        let norm: f64 = sum.iter().map(|x| x * x).sum::<f64>().sqrt();
        let embedding: Vec<f32> = if norm > 0.0 {
            sum.iter().map(|x| (*x / norm) as f32).collect()
        } else {
            sum.iter().map(|x| *x as f32).collect()
        };

        if embedding.len() != EMBEDDING_DIM {
            return Err(EmbeddingError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}

/// Encode a token's code points as a base-2^16 integer, wrapping on
/// overflow.
fn token_to_integer(token: &str) -> u64 {
    let mut n: u64 = 0;
    for c in token.chars().take(MAX_TOKEN_LENGTH) {
        n = n.wrapping_mul(65536).wrapping_add(c as u64);
    }
    n
}

/// Lowercased word tokens, split on whitespace and ASCII punctuation.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Cosine similarity between two vectors of equal length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_deterministic() {
        let embedder = Embedder::new();
        let a = embedder.embed("quarterly report figures").unwrap();
        let b = embedder.embed("quarterly report figures").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_different_texts_differ() {
        let embedder = Embedder::new();
        let a = embedder.embed("quarterly report").unwrap();
        let b = embedder.embed("lunch menu").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_embedding_is_unit_norm() {
        let embedder = Embedder::new();
        let v = embedder.embed("some text to embed").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_text_embeds_to_zero() {
        let embedder = Embedder::new();
        let v = embedder.embed("   ").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);

        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);

        let c = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &c) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_shared_tokens_raise_similarity() {
        let embedder = Embedder::new();
        let a = embedder.embed("budget review meeting").unwrap();
        let b = embedder.embed("budget review notes").unwrap();
        let c = embedder.embed("kernel panic stacktrace").unwrap();

        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }
}
