//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between signals, derived values and effects.
//!
//! # Overview
//!
//! The graph is expected to be a directed acyclic graph (DAG) where:
//!
//! - Nodes represent signals, derived values, or effects
//! - Edges represent dependencies: if A reads B, there is an edge from B to A
//!
//! When signals change, the runtime asks the graph for every affected node
//! and a topological order over them. Cycles are not prevented at edge
//! insertion time (dependencies are discovered by running user code); they are
//! detected when a pass tries to order them.
//!
//! Both forward (dependencies) and reverse (dependents) edges are kept so
//! dependency diffs and reachability are cheap in either direction.

mod node;
mod scheduler;

pub use node::{Node, NodeId, NodeKind};
pub use scheduler::{DependencyDiff, UpdateScheduler};
