//! Reference graph construction and component discovery.
//!
//! Emails are nodes in an arena indexed by buffer position; a Message-ID
//! table resolves reference headers to node indices. Traversal is an
//! explicit iterative BFS with a visited set, so cyclic or malformed
//! reference chains cannot loop or overflow the stack.

use std::collections::{HashMap, VecDeque};

use crate::models::Email;

/// Undirected adjacency over a buffer of emails, derived from their
/// reference headers.
pub struct ReferenceGraph {
    adjacency: Vec<Vec<usize>>,
    /// True for nodes that gained at least one resolved reference edge.
    resolved: Vec<bool>,
}

impl ReferenceGraph {
    /// Build the graph for a buffer. References to message ids not present
    /// in the corpus are dropped; self-references are ignored.
    pub fn build(emails: &[Email]) -> Self {
        // Message-ID -> node index. First occurrence wins on duplicates.
        let mut id_table: HashMap<&str, usize> = HashMap::new();
        for (index, email) in emails.iter().enumerate() {
            if let Some(msg_id) = email.message_id.as_deref() {
                if let Some(existing) = id_table.get(msg_id) {
                    log::debug!(
                        "duplicate Message-ID {} (emails {} and {})",
                        msg_id,
                        emails[*existing].id,
                        email.id
                    );
                } else {
                    id_table.insert(msg_id, index);
                }
            }
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); emails.len()];
        let mut resolved = vec![false; emails.len()];

        for (index, email) in emails.iter().enumerate() {
            for reference in &email.references {
                match id_table.get(reference.as_str()) {
                    Some(&target) if target != index => {
                        adjacency[index].push(target);
                        adjacency[target].push(index);
                        resolved[index] = true;
                        resolved[target] = true;
                    }
                    Some(_) => {} // self-reference
                    None => {
                        log::trace!(
                            "email {} references unknown message id {}, ignoring",
                            email.id,
                            reference
                        );
                    }
                }
            }
        }

        Self {
            adjacency,
            resolved,
        }
    }

    pub fn resolved(&self) -> &[bool] {
        &self.resolved
    }

    /// Weakly connected components, each a list of node indices.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let node_count = self.adjacency.len();
        let mut visited = vec![false; node_count];
        let mut components = Vec::new();

        for start in 0..node_count {
            if visited[start] {
                continue;
            }

            let mut component = Vec::new();
            let mut queue = VecDeque::new();
            visited[start] = true;
            queue.push_back(start);

            while let Some(node) = queue.pop_front() {
                component.push(node);
                for &neighbor in &self.adjacency[node] {
                    if !visited[neighbor] {
                        visited[neighbor] = true;
                        queue.push_back(neighbor);
                    }
                }
            }

            components.push(component);
        }

        components
    }
}
