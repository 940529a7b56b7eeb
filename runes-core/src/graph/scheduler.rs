//! Update Scheduler
//!
//! The scheduler owns the dependency edges and determines the order in which
//! nodes are revisited during a propagation pass. Dependencies always come
//! before their dependents.
//!
//! # Algorithm
//!
//! 1. Starting from the written signals, collect every node reachable through
//!    dependent edges (the pass closure).
//! 2. Sort the closure topologically with Kahn's algorithm, counting only
//!    edges inside the closure.
//! 3. Any node whose in-degree never reaches zero is on, or behind, a cycle.
//!    That is reported as [`ReactiveCycleError::Dependency`] rather than
//!    walked forever.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::node::{Node, NodeId, NodeKind};
use crate::error::ReactiveCycleError;

/// Edges added and removed by one [`UpdateScheduler::set_dependencies`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DependencyDiff {
    pub added: SmallVec<[NodeId; 4]>,
    pub removed: SmallVec<[NodeId; 4]>,
}

impl DependencyDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The update scheduler manages the dependency graph and coordinates updates.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph, along with every edge touching it.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&node_id)?;

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        Some(node)
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn kind_of(&self, node_id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&node_id).map(Node::kind)
    }

    /// Current dependencies of a node, in the order they were first read.
    pub fn dependencies_of(&self, node_id: NodeId) -> SmallVec<[NodeId; 8]> {
        self.nodes
            .get(&node_id)
            .map(|node| node.dependencies().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    ///
    /// Edges to nodes that are no longer in the graph are ignored.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) -> bool {
        if !self.nodes.contains_key(&dependency) || !self.nodes.contains_key(&dependent) {
            return false;
        }
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        self.nodes
            .get_mut(&dependent)
            .map(|node| node.add_dependency(dependency))
            .unwrap_or(false)
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) -> bool {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.remove_dependent(dependent);
        }
        self.nodes
            .get_mut(&dependent)
            .map(|node| node.remove_dependency(dependency))
            .unwrap_or(false)
    }

    /// Replace the dependency set of `node_id` with `next`, touching only the
    /// edges that actually changed.
    pub fn set_dependencies<I>(&mut self, node_id: NodeId, next: I) -> DependencyDiff
    where
        I: IntoIterator<Item = NodeId>,
    {
        let next: IndexSet<NodeId> = next.into_iter().collect();
        let previous = match self.nodes.get(&node_id) {
            Some(node) => node.dependencies().clone(),
            None => return DependencyDiff::default(),
        };

        let mut diff = DependencyDiff::default();
        for &old in previous.iter().filter(|id| !next.contains(*id)) {
            if self.remove_edge(old, node_id) {
                diff.removed.push(old);
            }
        }
        for &new in next.iter().filter(|id| !previous.contains(*id)) {
            if self.add_edge(new, node_id) {
                diff.added.push(new);
            }
        }
        diff
    }

    /// Every node reachable from `roots` through dependent edges, roots
    /// included, in breadth-first discovery order.
    pub fn reachable_from(&self, roots: &IndexSet<NodeId>) -> IndexSet<NodeId> {
        let mut visited = IndexSet::new();
        let mut queue: VecDeque<NodeId> = roots.iter().copied().collect();

        while let Some(node_id) = queue.pop_front() {
            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            if !visited.insert(node_id) {
                continue;
            }
            queue.extend(node.dependents().iter().copied());
        }

        visited
    }

    /// Perform a topological sort of the given nodes.
    ///
    /// Returns nodes in order such that dependencies come before dependents,
    /// or the nodes that could not be ordered.
    pub fn topological_order(
        &self,
        nodes: &IndexSet<NodeId>,
    ) -> Result<Vec<NodeId>, ReactiveCycleError> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(nodes.len());
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        // Calculate in-degrees (only counting edges within the node set)
        for &node_id in nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| nodes.contains(*d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(&dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent_id);
                        }
                    }
                }
            }
        }

        if result.len() < in_degree.len() {
            let mut stuck: Vec<NodeId> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id)
                .collect();
            stuck.sort();
            return Err(ReactiveCycleError::Dependency { nodes: stuck });
        }

        Ok(result)
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop every node and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
