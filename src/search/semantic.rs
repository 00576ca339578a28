//! Semantic retrieval: fixed-dimension embeddings with cosine ranking.
//!
//! One vector per email, computed at build time with the same embedder the
//! query goes through. Vectors are unit-norm, so similarity reduces to a
//! dot product. The corpus here is small enough that a full scan beats
//! maintaining an approximate-nearest-neighbor structure.

use crate::models::EmailDoc;
use crate::search::embedding::{Embedder, EmbeddingError, EMBEDDING_DIM};
use crate::search::engine::Ranker;

/// Vector index over email subject+body embeddings.
pub struct SemanticIndex {
    vectors: Vec<Vec<f32>>,
    doc_ids: Vec<i64>,
    embedder: Embedder,
}

impl SemanticIndex {
    /// Embed the whole corpus. Rebuilds are wholesale; there is no
    /// incremental path.
    pub fn build(corpus: &[EmailDoc]) -> Result<Self, EmbeddingError> {
        let embedder = Embedder::new();
        let mut vectors = Vec::with_capacity(corpus.len());
        let mut doc_ids = Vec::with_capacity(corpus.len());

        for email in corpus {
            let text = format!("{}\n\n{}", email.subject, email.body);
            vectors.push(embedder.embed(&text)?);
            doc_ids.push(email.id);
        }

        log::debug!(
            "semantic index: {} vectors of dimension {}",
            vectors.len(),
            EMBEDDING_DIM
        );

        Ok(Self {
            vectors,
            doc_ids,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Rank the corpus by cosine similarity to the query, descending,
    /// ties broken by email id.
    pub fn query(&self, query: &str, limit: usize) -> Result<Vec<(i64, f32)>, EmbeddingError> {
        let query_vector = self.embedder.embed(query)?;

        let mut ranked: Vec<(i64, f32)> = self
            .vectors
            .iter()
            .zip(&self.doc_ids)
            .map(|(vector, &id)| {
                // Both sides are unit-norm (or zero), so the dot product is
                // the cosine similarity.
                let similarity: f32 = vector
                    .iter()
                    .zip(&query_vector)
                    .map(|(a, b)| a * b)
                    .sum();
                (id, similarity)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}

impl Ranker for SemanticIndex {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn rank(&self, query: &str, limit: usize) -> Vec<(i64, f32)> {
        match self.query(query, limit) {
            Ok(ranked) => ranked,
            Err(err) => {
                log::error!("semantic ranking failed: {}", err);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: i64, subject: &str, body: &str) -> EmailDoc {
        EmailDoc {
            id,
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    fn corpus() -> Vec<EmailDoc> {
        vec![
            doc(1, "Quarterly report", "The quarterly report is attached."),
            doc(2, "Team offsite", "Planning the autumn team offsite."),
            doc(3, "Re: Quarterly report", "Numbers in the report look good."),
        ]
    }

    #[test]
    fn test_similarity_descends() {
        let index = SemanticIndex::build(&corpus()).unwrap();
        let hits = index.query("quarterly report", 10).unwrap();
        assert_eq!(hits.len(), 3);
        for window in hits.windows(2) {
            assert!(window[0].1 >= window[1].1);
        }
        // The on-topic documents outrank the offsite one.
        let offsite_rank = hits.iter().position(|(id, _)| *id == 2).unwrap();
        assert_eq!(offsite_rank, 2);
    }

    #[test]
    fn test_identical_text_ranks_first() {
        let index = SemanticIndex::build(&corpus()).unwrap();
        let hits = index
            .query("Team offsite Planning the autumn team offsite", 1)
            .unwrap();
        assert_eq!(hits[0].0, 2);
    }

    #[test]
    fn test_empty_corpus() {
        let index = SemanticIndex::build(&[]).unwrap();
        assert!(index.is_empty());
        assert!(index.query("anything", 10).unwrap().is_empty());
    }
}
