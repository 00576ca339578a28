//! Subject normalization and fallback grouping.
//!
//! When reference headers are missing or unresolvable, same-subject emails
//! sent close together in time are assumed to belong to one conversation.
//! Normalization strips reply/forward prefixes and bracketed tags so the
//! comparison survives client-added noise.

use std::collections::BTreeMap;

use chrono::Duration;

use crate::models::Email;

/// Normalize an email subject for threading comparison.
///
/// Repeatedly strips `Re:`/`Fwd:`/`Fw:`/`Aw:` prefixes and leading
/// bracketed tags (`[PATCH v2]`, `[RFC]`, ...), lowercases, and collapses
/// whitespace.
pub fn normalize_subject(subject: &str) -> String {
    let mut normalized = subject.trim().to_lowercase();

    // Keep removing prefixes until none match.
    loop {
        let before = normalized.clone();

        for prefix in &["re:", "fwd:", "fw:", "aw:"] {
            if normalized.starts_with(prefix) {
                normalized = normalized[prefix.len()..].trim_start().to_string();
            }
        }

        if normalized.starts_with('[') {
            if let Some(end_bracket) = normalized.find(']') {
                normalized = normalized[end_bracket + 1..].trim_start().to_string();
            }
        }

        if before == normalized {
            break;
        }
    }

    let words: Vec<&str> = normalized.split_whitespace().collect();
    words.join(" ")
}

/// Merge singleton components without reference edges into subject-keyed
/// chains bounded by `window`.
///
/// `components` is consumed; the returned grouping covers the same set of
/// node indices. Components built from reference edges pass through
/// untouched, as do orphans with an empty normalized subject.
pub fn regroup_orphans(
    emails: &[Email],
    components: Vec<Vec<usize>>,
    resolved: &[bool],
    window: Duration,
) -> Vec<Vec<usize>> {
    let mut kept: Vec<Vec<usize>> = Vec::new();
    // BTreeMap keeps fallback grouping order deterministic.
    let mut by_subject: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for component in components {
        if component.len() == 1 && !resolved[component[0]] {
            let index = component[0];
            let key = emails[index].normalized_subject.clone();
            if key.is_empty() {
                kept.push(component);
            } else {
                by_subject.entry(key).or_default().push(index);
            }
        } else {
            kept.push(component);
        }
    }

    for (_, mut members) in by_subject {
        members.sort_by_key(|&i| (emails[i].date, emails[i].id));

        let mut chain: Vec<usize> = Vec::new();
        for index in members {
            match chain.last() {
                Some(&previous) if emails[index].date - emails[previous].date <= window => {
                    chain.push(index);
                }
                Some(_) => {
                    kept.push(std::mem::take(&mut chain));
                    chain.push(index);
                }
                None => chain.push(index),
            }
        }
        if !chain.is_empty() {
            kept.push(chain);
        }
    }

    kept
}
