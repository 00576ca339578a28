//! Lexical retrieval: an in-memory inverted index with BM25 scoring.
//!
//! Built wholesale from the committed corpus over normalized subject+body
//! text; never patched in place. Unknown or empty query terms simply
//! contribute nothing, so querying can never fail.

use std::collections::HashMap;

use crate::models::EmailDoc;
use crate::search::engine::Ranker;

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Debug, Clone, Copy)]
struct Posting {
    /// Position into `doc_ids` / `doc_lengths`.
    doc: u32,
    /// Term frequency within the document.
    tf: u32,
}

/// Inverted index over email subject+body text.
pub struct LexicalIndex {
    postings: HashMap<String, Vec<Posting>>,
    doc_ids: Vec<i64>,
    doc_lengths: Vec<u32>,
    avg_doc_length: f32,
}

impl LexicalIndex {
    /// Build the index from the committed corpus.
    pub fn build(corpus: &[EmailDoc]) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_ids = Vec::with_capacity(corpus.len());
        let mut doc_lengths = Vec::with_capacity(corpus.len());

        for (doc, email) in corpus.iter().enumerate() {
            let text = format!("{} {}", email.subject, email.body);
            let tokens = tokenize(&text);
            doc_ids.push(email.id);
            doc_lengths.push(tokens.len() as u32);

            let mut frequencies: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *frequencies.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in frequencies {
                postings.entry(term).or_default().push(Posting {
                    doc: doc as u32,
                    tf,
                });
            }
        }

        let total: u64 = doc_lengths.iter().map(|&l| l as u64).sum();
        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            total as f32 / doc_lengths.len() as f32
        };

        log::debug!(
            "lexical index: {} documents, {} terms",
            doc_ids.len(),
            postings.len()
        );

        Self {
            postings,
            doc_ids,
            doc_lengths,
            avg_doc_length,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    fn idf(&self, document_frequency: usize) -> f32 {
        let n = self.doc_ids.len() as f32;
        let df = document_frequency as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Score all documents matching any query term, ranked descending,
    /// ties broken by email id for determinism.
    pub fn query(&self, query: &str, limit: usize) -> Vec<(i64, f32)> {
        let mut scores: HashMap<u32, f32> = HashMap::new();

        for term in tokenize(query) {
            let Some(postings) = self.postings.get(&term) else {
                continue;
            };
            let idf = self.idf(postings.len());

            for posting in postings {
                let tf = posting.tf as f32;
                let length_ratio =
                    self.doc_lengths[posting.doc as usize] as f32 / self.avg_doc_length.max(1.0);
                let score = idf * tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * length_ratio));
                *scores.entry(posting.doc).or_insert(0.0) += score;
            }
        }

        let mut ranked: Vec<(i64, f32)> = scores
            .into_iter()
            .map(|(doc, score)| (self.doc_ids[doc as usize], score))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(limit);
        ranked
    }
}

impl Ranker for LexicalIndex {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn rank(&self, query: &str, limit: usize) -> Vec<(i64, f32)> {
        self.query(query, limit)
    }
}

/// Lowercased alphanumeric runs.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}
