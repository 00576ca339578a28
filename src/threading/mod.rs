//! Thread reconstruction.
//!
//! Groups buffered emails into conversation threads in two passes:
//!
//! 1. **Reference graph**: an edge links each email to every email whose
//!    Message-ID appears in its References/In-Reply-To chain. Weakly
//!    connected components of this graph are the primary thread candidates.
//!    References to message ids absent from the corpus are ignored; they do
//!    not create phantom nodes.
//! 2. **Subject fallback**: emails with no resolvable reference edge are
//!    regrouped by normalized subject, chained only while consecutive
//!    messages fall within a bounded time window. A last resort for threads
//!    whose reference headers were lost; it never merges distinct subjects
//!    and never folds messages into reference-built threads.
//!
//! Reconstruction is deterministic and total: every email lands in exactly
//! one thread, isolated messages in threads of size one. Within a thread,
//! emails are ordered by date with ingestion order breaking ties, and the
//! earliest message is the root.

pub mod graph;
pub mod subject;

pub use subject::normalize_subject;

use chrono::Duration;

use crate::models::Email;

/// One reconstructed conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadGroup {
    /// Member email ids, ordered by (date, id) ascending.
    pub email_ids: Vec<i64>,
    /// The earliest member.
    pub root_email_id: i64,
}

/// Group a buffer of emails into threads.
///
/// `fallback_window` bounds the time proximity required for the subject
/// fallback to chain two same-subject messages together.
pub fn compute_threads(buffer: &[Email], fallback_window: Duration) -> Vec<ThreadGroup> {
    let reference_graph = graph::ReferenceGraph::build(buffer);
    let components = reference_graph.components();
    let grouped = subject::regroup_orphans(
        buffer,
        components,
        reference_graph.resolved(),
        fallback_window,
    );

    let mut threads: Vec<ThreadGroup> = grouped
        .into_iter()
        .map(|mut members| {
            members.sort_by_key(|&i| (buffer[i].date, buffer[i].id));
            let email_ids: Vec<i64> = members.iter().map(|&i| buffer[i].id).collect();
            let root_email_id = email_ids[0];
            ThreadGroup {
                email_ids,
                root_email_id,
            }
        })
        .collect();

    // Stable thread numbering: order threads by their root.
    threads.sort_by_key(|t| t.root_email_id);

    log::info!("reconstructed {} threads from {} emails", threads.len(), buffer.len());

    threads
}
