//! Hybrid search: lexical and semantic retrieval behind one engine.

pub mod embedding;
pub mod engine;
pub mod lexical;
pub mod semantic;

pub use embedding::{Embedder, EmbeddingError, EMBEDDING_DIM};
pub use engine::{fuse_reciprocal_rank, HybridEngine, QueryError, RankedResults, Ranker, RRF_K};
pub use lexical::LexicalIndex;
pub use semantic::SemanticIndex;

use crate::models::EmailDoc;

/// Build both indices from the committed corpus.
///
/// A failed build disables that signal (`None`) instead of aborting; the
/// engine reports the degradation per query.
pub fn build_indexes(corpus: &[EmailDoc]) -> (Option<LexicalIndex>, Option<SemanticIndex>) {
    let lexical = Some(LexicalIndex::build(corpus));

    let semantic = match SemanticIndex::build(corpus) {
        Ok(index) => Some(index),
        Err(err) => {
            log::error!("semantic index build failed: {}. Continuing lexical-only.", err);
            None
        }
    };

    (lexical, semantic)
}
