// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::dag::plan::ExecutionPlan;
use crate::dag::task::{Task, TaskName};
use crate::errors::{PipelineError, Result};

/// Mutable collection of declared tasks, in declaration order.
///
/// Dependencies are never declared explicitly: a task depends on another
/// when one of its inputs selects the other's output. Call [`TaskGraph::build`]
/// to infer those edges and obtain an [`ExecutionPlan`].
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<TaskName, usize>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a validated [`ConfigFile`], registering tasks in the
    /// order they appear in the file.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut graph = Self::new();
        for task in cfg.tasks() {
            graph.add_task(task.clone())?;
        }
        Ok(graph)
    }

    /// Register a task. Fails if a task with the same name already exists.
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if self.index.contains_key(task.name()) {
            return Err(PipelineError::DuplicateTask(task.name().to_string()));
        }
        self.index.insert(task.name().to_string(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Infer producer -> consumer edges and sort the tasks topologically.
    ///
    /// Among tasks that are ready at the same time the one declared first
    /// runs first, so the plan (and the logs) are stable across runs.
    ///
    /// Inputs that match nothing are *not* an error here: source files may
    /// not exist yet in watch mode. That check happens when a task executes.
    pub fn build(&self) -> Result<ExecutionPlan> {
        let graph = self.infer_edges();

        // Kahn's algorithm with a min-heap over declaration indices.
        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for consumer in graph.neighbors_directed(NodeIndex::new(idx), Direction::Outgoing) {
                let c = consumer.index();
                in_degree[c] -= 1;
                if in_degree[c] == 0 {
                    ready.push(Reverse(c));
                }
            }
        }

        if order.len() < self.tasks.len() {
            return Err(PipelineError::CyclicDependency {
                members: self.cycle_members(&graph),
            });
        }

        let names: Vec<&str> = order.iter().map(|&i| self.tasks[i].name()).collect();
        debug!(order = ?names, "task graph sorted");

        Ok(ExecutionPlan::new(self.tasks.clone(), graph, order))
    }

    /// Edge `producer -> consumer` whenever an input pattern of `consumer`
    /// selects an output of a *different* task `producer`.
    fn infer_edges(&self) -> DiGraph<usize, ()> {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(self.tasks.len(), 0);
        for idx in 0..self.tasks.len() {
            graph.add_node(idx);
        }

        for (c, consumer) in self.tasks.iter().enumerate() {
            for (p, producer) in self.tasks.iter().enumerate() {
                if c == p {
                    continue;
                }
                if consumer.consumes_output_of(producer) {
                    debug!(
                        producer = %producer.name(),
                        consumer = %consumer.name(),
                        output = %producer.output(),
                        "inferred dependency edge"
                    );
                    graph.update_edge(NodeIndex::new(p), NodeIndex::new(c), ());
                }
            }
        }

        graph
    }

    /// Names of the tasks in the first (by declaration order) strongly
    /// connected component that forms a cycle.
    fn cycle_members(&self, graph: &DiGraph<usize, ()>) -> Vec<TaskName> {
        let mut cycles: Vec<Vec<usize>> = tarjan_scc(graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<usize> = scc.into_iter().map(|n| n.index()).collect();
                members.sort_unstable();
                members
            })
            .collect();
        cycles.sort_by_key(|members| members[0]);

        cycles
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|i| self.tasks[i].name().to_string())
            .collect()
    }
}
