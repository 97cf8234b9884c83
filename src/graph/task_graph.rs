// src/graph/task_graph.rs

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace, warn};

use crate::graph::node::{EdgeState, Handle, TaskBody, TaskNode};

/// Directed acyclic graph of submitted tasks.
///
/// Nodes carry the suspended task bodies; edges record whether the
/// dependency they express has been satisfied. Nodes are kept in handle
/// order, which makes readiness extraction stable: earlier submissions are
/// considered first.
///
/// A node lives in the graph until it has no dependents left and has either
/// finished or been cancelled. A finished node with dependents is retained
/// so the dependents can observe its completed outgoing edges.
pub struct TaskGraph<T> {
    nodes: BTreeMap<Handle, TaskNode<T>>,
}

impl<T> Default for TaskGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskGraph<T> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    /// Number of nodes currently held, including finished nodes retained
    /// for their dependents.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.nodes.contains_key(&handle)
    }

    /// Insert a fresh node with no edges.
    pub(crate) fn insert(&mut self, handle: Handle, body: TaskBody<T>, detached: bool) {
        debug_assert!(!self.nodes.contains_key(&handle), "task handle reused");
        self.nodes.insert(handle, TaskNode::new(body, detached));
    }

    /// Record that `child` depends on `parent`.
    ///
    /// A missing endpoint makes this a no-op: a parent that already finished
    /// and left the graph (or was cancelled) must not block the child. A
    /// parent that is still in the graph but has already finished yields an
    /// edge that is born completed, for the same reason.
    pub(crate) fn add_dependency(&mut self, parent: Handle, child: Handle) {
        if parent == child {
            warn!(task = %parent, "ignoring self-dependency");
            return;
        }
        let parent_finished = match self.nodes.get(&parent) {
            Some(node) => node.finished,
            None => {
                debug!(%parent, %child, "parent no longer in graph; child is unconstrained");
                return;
            }
        };
        if !self.nodes.contains_key(&child) {
            debug!(%parent, %child, "child no longer in graph; dropping edge");
            return;
        }
        debug_assert!(
            !self.reaches(child, parent),
            "dependency edge {parent} -> {child} would close a cycle"
        );

        if let Some(node) = self.nodes.get_mut(&parent) {
            if !node.dependents.contains(&child) {
                node.dependents.push(child);
            }
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            let state = if parent_finished {
                EdgeState::Completed
            } else {
                EdgeState::Pending
            };
            node.deps.insert(parent, state);
        }
    }

    /// Handles of nodes ready to run, in handle order, at most `limit`.
    ///
    /// A node is ready when its body has not been claimed yet and every
    /// incoming edge is completed. Finished nodes retained for their
    /// dependents have no body left and therefore never qualify again.
    pub fn ready_nodes(&self, limit: usize) -> Vec<Handle> {
        self.nodes
            .iter()
            .filter(|(_, node)| {
                node.body.is_some() && node.deps.values().all(|e| *e == EdgeState::Completed)
            })
            .map(|(handle, _)| *handle)
            .take(limit)
            .collect()
    }

    /// Claim a node's body for execution.
    ///
    /// Returns the body and whether the submission was detached; `None` if
    /// the node is gone or its body was already claimed.
    pub(crate) fn claim_body(&mut self, handle: Handle) -> Option<(TaskBody<T>, bool)> {
        let node = self.nodes.get_mut(&handle)?;
        let body = node.body.take()?;
        Some((body, node.detached))
    }

    /// Graph half of the epilogue for a node whose body has terminated.
    ///
    /// With dependents present, every outgoing edge flips to completed and
    /// the node is retained so the dependents can observe that. Without
    /// dependents the node is removed, together with any finished ancestor
    /// whose last dependent it was.
    ///
    /// Applying this to the same node twice is a no-op: the node is either
    /// gone or has no pending outgoing edges left to flip.
    pub(crate) fn finish_node(&mut self, handle: Handle) {
        let Some(node) = self.nodes.get_mut(&handle) else {
            trace!(task = %handle, "finished node already removed");
            return;
        };
        if node.dependents.is_empty() {
            self.remove_node(handle);
        } else {
            node.finished = true;
            let dependents = node.dependents.clone();
            for dependent in dependents {
                if let Some(child) = self.nodes.get_mut(&dependent) {
                    child.deps.insert(handle, EdgeState::Completed);
                }
            }
        }
    }

    /// Remove `root` and every transitive dependent.
    ///
    /// Returns the removed handles, `root` first. Empty if `root` is not in
    /// the graph.
    pub(crate) fn remove_closure(&mut self, root: Handle) -> Vec<Handle> {
        if !self.nodes.contains_key(&root) {
            return Vec::new();
        }

        let mut stack = vec![root];
        let mut seen: HashSet<Handle> = HashSet::new();
        let mut closure = Vec::new();
        while let Some(handle) = stack.pop() {
            if !seen.insert(handle) {
                continue;
            }
            closure.push(handle);
            if let Some(node) = self.nodes.get(&handle) {
                stack.extend(node.dependents.iter().copied());
            }
        }

        for handle in &closure {
            let Some(node) = self.nodes.remove(handle) else {
                continue;
            };
            // Parents outside the closure lose a dependent; a finished
            // parent that just lost its last one is residue and goes too.
            for parent in node.deps.keys() {
                if seen.contains(parent) {
                    continue;
                }
                if let Some(p) = self.nodes.get_mut(parent) {
                    p.dependents.retain(|d| d != handle);
                    if p.dependents.is_empty() && p.finished {
                        self.remove_node(*parent);
                    }
                }
            }
        }

        closure
    }

    /// Drop every node at once.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Direct dependencies of a node, with their edge tags.
    pub fn dependencies_of(&self, handle: Handle) -> Vec<(Handle, EdgeState)> {
        self.nodes
            .get(&handle)
            .map(|node| node.deps.iter().map(|(h, e)| (*h, *e)).collect())
            .unwrap_or_default()
    }

    /// Direct dependents of a node.
    pub fn dependents_of(&self, handle: Handle) -> Vec<Handle> {
        self.nodes
            .get(&handle)
            .map(|node| node.dependents.clone())
            .unwrap_or_default()
    }

    /// Remove a node and cascade upwards: a finished parent that just lost
    /// its last dependent has nobody left to observe it.
    fn remove_node(&mut self, handle: Handle) {
        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            let Some(node) = self.nodes.remove(&h) else {
                continue;
            };
            for parent in node.deps.keys() {
                if let Some(p) = self.nodes.get_mut(parent) {
                    p.dependents.retain(|d| *d != h);
                    if p.dependents.is_empty() && p.finished {
                        stack.push(*parent);
                    }
                }
            }
        }
    }

    /// Whether `from` can reach `to` following dependent edges.
    fn reaches(&self, from: Handle, to: Handle) -> bool {
        let mut stack = vec![from];
        let mut seen: HashSet<Handle> = HashSet::new();
        while let Some(handle) = stack.pop() {
            if handle == to {
                return true;
            }
            if !seen.insert(handle) {
                continue;
            }
            if let Some(node) = self.nodes.get(&handle) {
                stack.extend(node.dependents.iter().copied());
            }
        }
        false
    }
}
