//! Static view of the node registry as a `petgraph` DAG.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};

use super::selectors::REGISTRY;
use super::{NodeName, Result};
use crate::error::DeriveError;

/// Edges run from an input to the node that reads it.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<NodeName, ()>,
    index: HashMap<NodeName, NodeIndex>,
}

impl DependencyGraph {
    /// Build from the registry, failing on inputs that name no node.
    pub fn from_registry() -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for node in REGISTRY {
            index.insert(node.name(), graph.add_node(node.name()));
        }
        for node in REGISTRY {
            let to = index[node.name()];
            for input in node.inputs() {
                let from = *index
                    .get(input)
                    .ok_or_else(|| DeriveError::UnknownNode(input.to_string()))?;
                graph.add_edge(from, to, ());
            }
        }

        Ok(Self { graph, index })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Inputs before dependents; fails if the registry has a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeName>> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|ix| self.graph[ix]).collect())
            .map_err(|cycle| DeriveError::Cycle(self.graph[cycle.node_id()].to_string()))
    }

    /// Declared inputs of `name`.
    pub fn inputs_of(&self, name: &str) -> Result<Vec<NodeName>> {
        let ix = self.node(name)?;
        Ok(self
            .graph
            .neighbors_directed(ix, Direction::Incoming)
            .map(|n| self.graph[n])
            .collect())
    }

    /// Every node whose value may change when `name` changes.
    pub fn dependents_of(&self, name: &str) -> Result<Vec<NodeName>> {
        let start = self.node(name)?;
        let mut bfs = Bfs::new(&self.graph, start);
        let mut out = Vec::new();
        while let Some(ix) = bfs.next(&self.graph) {
            if ix != start {
                out.push(self.graph[ix]);
            }
        }
        Ok(out)
    }

    /// Every node `name` transitively reads.
    pub fn ancestors_of(&self, name: &str) -> Result<Vec<NodeName>> {
        let start = self.node(name)?;
        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, start);
        let mut out = Vec::new();
        while let Some(ix) = bfs.next(reversed) {
            if ix != start {
                out.push(self.graph[ix]);
            }
        }
        Ok(out)
    }

    fn node(&self, name: &str) -> Result<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DeriveError::UnknownNode(name.to_string()))
    }
}
