//! Dependency graph over workflow agents.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::prelude::StableGraph;
use petgraph::Direction;

use super::Workflow;
use crate::error::HarperError;

/// Directed graph with an edge `dependency -> dependant` for each
/// `depends_on` entry. Node weights are indices into `Workflow::agents`.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: StableGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Validate the workflow and build its graph, rejecting cycles.
    pub fn build(workflow: &Workflow) -> Result<Self, HarperError> {
        workflow.validate()?;

        let mut graph = StableGraph::new();
        let mut by_id: HashMap<&str, NodeIndex> = HashMap::new();
        let mut nodes = Vec::with_capacity(workflow.agents.len());
        for (index, agent) in workflow.agents.iter().enumerate() {
            let node = graph.add_node(index);
            by_id.insert(agent.id.as_str(), node);
            nodes.push(node);
        }
        for (index, agent) in workflow.agents.iter().enumerate() {
            for dep in &agent.depends_on {
                if let Some(&from) = by_id.get(dep.as_str()) {
                    graph.add_edge(from, nodes[index], ());
                }
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            let index = graph[cycle.node_id()];
            HarperError::CycleDetected(workflow.agents[index].id.clone())
        })?;

        Ok(Self { graph, nodes })
    }

    /// Group agents into stages: an agent lands one stage after its latest
    /// dependency. Members keep workflow order.
    pub fn levels(&self) -> Vec<Vec<usize>> {
        let mut depth: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let order = match toposort(&self.graph, None) {
            Ok(order) => order,
            Err(_) => return Vec::new(),
        };
        for node in order {
            let index = self.graph[node];
            let level = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .filter_map(|dep| depth[self.graph[dep]])
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth[index] = Some(level);
        }

        let mut levels: Vec<Vec<usize>> = Vec::new();
        for (index, level) in depth.into_iter().enumerate() {
            let Some(level) = level else { continue };
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(index);
        }
        levels
    }
}
