//! The hybrid query engine: fans a query out to both indices and returns
//! both ranked lists.
//!
//! Each index sits behind the `Ranker` trait, so the engine is agnostic to
//! the concrete ranking technique and either side can be swapped without
//! touching the fallback logic. When one index failed to build, queries
//! degrade to the other signal and the response names what was dropped;
//! only when both are missing does a query fail.
//!
//! Indices are installed behind a single `RwLock`, so a rebuild is atomic
//! with respect to concurrent queries: readers see the old pair or the new
//! pair, never a mix.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;
use thiserror::Error;

use crate::search::lexical::LexicalIndex;
use crate::search::semantic::SemanticIndex;

/// A side-effect-free ranking capability over the corpus.
pub trait Ranker: Send + Sync {
    fn name(&self) -> &'static str;
    /// Ranked (email id, score) pairs, descending, at most `limit` entries.
    fn rank(&self, query: &str, limit: usize) -> Vec<(i64, f32)>;
}

/// Errors surfaced to the caller at query time.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no search index is available")]
    IndexUnavailable,
    #[error("search engine has not been initialized")]
    EngineNotReady,
}

/// Both ranked result sets for one query, plus the names of any signals
/// that could not be served.
#[derive(Debug, Default)]
pub struct RankedResults {
    pub lexical: Vec<(i64, f32)>,
    pub semantic: Vec<(i64, f32)>,
    pub degraded: Vec<String>,
}

#[derive(Default)]
struct Indexes {
    installed: bool,
    lexical: Option<LexicalIndex>,
    semantic: Option<SemanticIndex>,
}

/// Read-only dual-index query engine.
#[derive(Default)]
pub struct HybridEngine {
    inner: RwLock<Indexes>,
}

impl HybridEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace both indices. `None` marks an index that failed
    /// to build; queries will degrade accordingly.
    pub fn install(&self, lexical: Option<LexicalIndex>, semantic: Option<SemanticIndex>) {
        let mut inner = self.inner.write();
        inner.installed = true;
        inner.lexical = lexical;
        inner.semantic = semantic;
    }

    /// Query both indices independently.
    ///
    /// The caller is expected to reject empty queries before invoking this;
    /// a blank query received anyway yields empty result sets, not an
    /// error. Fails only when neither index can serve.
    pub fn search(&self, query: &str, limit: usize) -> Result<RankedResults, QueryError> {
        let inner = self.inner.read();
        if !inner.installed {
            return Err(QueryError::EngineNotReady);
        }
        if inner.lexical.is_none() && inner.semantic.is_none() {
            return Err(QueryError::IndexUnavailable);
        }

        let mut results = RankedResults::default();

        match &inner.lexical {
            Some(index) => results.lexical = index.rank(query, limit),
            None => {
                log::warn!("lexical index unavailable, serving semantic only");
                results.degraded.push("lexical".to_string());
            }
        }

        match &inner.semantic {
            Some(index) => results.semantic = index.rank(query, limit),
            None => {
                log::warn!("semantic index unavailable, serving lexical only");
                results.degraded.push("semantic".to_string());
            }
        }

        Ok(results)
    }
}

/// Standard RRF constant from Cormack, Clarke & Buettcher (SIGIR 2009).
pub const RRF_K: usize = 60;

/// Combine two ranked lists with reciprocal rank fusion:
/// `score(d) = Σ 1 / (k + rank(d))` over the lists containing `d`.
///
/// Offered to integrators who want one fused list; the HTTP contract
/// exposes the two signals separately.
pub fn fuse_reciprocal_rank<T: Clone + Eq + Hash + Ord>(
    results_a: &[(T, f32)],
    results_b: &[(T, f32)],
    k: usize,
) -> Vec<(T, f32)> {
    let k_param = k as f32;
    let mut fused: HashMap<T, f32> = HashMap::new();

    for results in [results_a, results_b] {
        for (rank, (item, _)) in results.iter().enumerate() {
            let contribution = 1.0 / (k_param + (rank + 1) as f32);
            *fused.entry(item.clone()).or_insert(0.0) += contribution;
        }
    }

    let mut combined: Vec<(T, f32)> = fused.into_iter().collect();
    combined.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailDoc;

    fn doc(id: i64, subject: &str, body: &str) -> EmailDoc {
        EmailDoc {
            id,
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    fn corpus() -> Vec<EmailDoc> {
        vec![
            doc(1, "Quarterly report", "Attached is the quarterly report."),
            doc(2, "Lunch", "Lunch on Friday?"),
        ]
    }

    #[test]
    fn test_search_returns_both_signals() {
        let engine = HybridEngine::new();
        engine.install(
            Some(LexicalIndex::build(&corpus())),
            SemanticIndex::build(&corpus()).ok(),
        );

        let results = engine.search("quarterly report", 10).unwrap();
        assert!(!results.lexical.is_empty());
        assert!(!results.semantic.is_empty());
        assert!(results.degraded.is_empty());
        assert_eq!(results.lexical[0].0, 1);
    }

    #[test]
    fn test_semantic_outage_degrades_to_lexical() {
        let engine = HybridEngine::new();
        engine.install(Some(LexicalIndex::build(&corpus())), None);

        let results = engine.search("quarterly report", 10).unwrap();
        assert!(!results.lexical.is_empty());
        assert!(results.semantic.is_empty());
        assert_eq!(results.degraded, vec!["semantic".to_string()]);
    }

    #[test]
    fn test_lexical_outage_degrades_to_semantic() {
        let engine = HybridEngine::new();
        engine.install(None, SemanticIndex::build(&corpus()).ok());

        let results = engine.search("quarterly report", 10).unwrap();
        assert!(results.lexical.is_empty());
        assert!(!results.semantic.is_empty());
        assert_eq!(results.degraded, vec!["lexical".to_string()]);
    }

    #[test]
    fn test_both_indices_missing_is_an_error() {
        let engine = HybridEngine::new();
        engine.install(None, None);
        assert!(matches!(
            engine.search("q", 10),
            Err(QueryError::IndexUnavailable)
        ));
    }

    #[test]
    fn test_uninstalled_engine_is_not_ready() {
        let engine = HybridEngine::new();
        assert!(matches!(
            engine.search("q", 10),
            Err(QueryError::EngineNotReady)
        ));
    }

    #[test]
    fn test_single_token_query_is_tolerated() {
        let engine = HybridEngine::new();
        engine.install(
            Some(LexicalIndex::build(&corpus())),
            SemanticIndex::build(&corpus()).ok(),
        );
        let results = engine.search("lunch", 10).unwrap();
        assert_eq!(results.lexical[0].0, 2);
    }

    #[test]
    fn test_rrf_rewards_agreement() {
        let a = vec![(1i64, 0.9), (2, 0.8), (3, 0.7)];
        let b = vec![(3i64, 10.0), (1, 8.0), (4, 5.0)];

        let fused = fuse_reciprocal_rank(&a, &b, RRF_K);
        assert_eq!(fused.len(), 4);
        let top: Vec<i64> = fused.iter().take(2).map(|(id, _)| *id).collect();
        assert!(top.contains(&1));
        assert!(top.contains(&3));
    }

    #[test]
    fn test_rrf_single_list_preserves_order() {
        let a = vec![(1i64, 3.0), (2, 2.0), (3, 1.0)];
        let fused = fuse_reciprocal_rank(&a, &[], RRF_K);
        let ids: Vec<i64> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
