// src/dag/plan.rs

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::dag::task::{Task, TaskName, TaskOutput};

/// Read-only result of [`crate::dag::TaskGraph::build`]: the tasks, the
/// inferred dependency edges and one topological order.
///
/// Tasks are addressed internally by declaration index; the public API
/// speaks task names.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    tasks: Vec<Task>,
    /// Edge direction: producer -> consumer.
    graph: DiGraph<usize, ()>,
    order: Vec<usize>,
    by_name: HashMap<TaskName, usize>,
    output_owner: HashMap<String, usize>,
    /// Tasks with a per-input output mapping.
    mapped: Vec<usize>,
}

impl ExecutionPlan {
    pub(crate) fn new(tasks: Vec<Task>, graph: DiGraph<usize, ()>, order: Vec<usize>) -> Self {
        let by_name = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();
        let output_owner = tasks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.output().as_file().map(|path| (path.to_string(), i)))
            .collect();
        let mapped = tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t.output(), TaskOutput::Each(_)))
            .map(|(i, _)| i)
            .collect();

        Self {
            tasks,
            graph,
            order,
            by_name,
            output_owner,
            mapped,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task names in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.tasks[i].name()).collect()
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.by_name.get(name).map(|&i| &self.tasks[i])
    }

    /// Position of `name` in the execution order.
    pub fn position(&self, name: &str) -> Option<usize> {
        let idx = *self.by_name.get(name)?;
        self.order.iter().position(|&i| i == idx)
    }

    /// Tasks whose output `name` consumes, in declaration order.
    pub fn producers_of(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, Direction::Incoming)
    }

    /// Tasks consuming the output of `name`, in declaration order.
    pub fn consumers_of(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, Direction::Outgoing)
    }

    /// The task writing `path`, if any.
    pub fn producer_of_output(&self, path: &str) -> Option<&str> {
        self.output_owner_index(path).map(|i| self.tasks[i].name())
    }

    /// Every single-file output path.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().filter_map(|t| t.output().as_file())
    }

    /// Globs covering what per-input output mappings write.
    pub fn output_globs(&self) -> Vec<String> {
        self.mapped
            .iter()
            .filter_map(|&i| match self.tasks[i].output() {
                TaskOutput::Each(each) => Some(each.as_glob()),
                TaskOutput::File(_) => None,
            })
            .collect()
    }

    /// Every input pattern string across all tasks, deduplicated.
    pub fn input_patterns(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.tasks
            .iter()
            .flat_map(|t| t.inputs())
            .filter(|p| seen.insert(p.as_str().to_string()))
            .map(|p| p.as_str().to_string())
            .collect()
    }

    /// Minimal set of tasks to re-run after `changed` paths were modified:
    /// every task with an input selecting a changed path, plus everything
    /// reachable from those through dependency edges. Returned in execution
    /// order.
    pub fn affected_by(&self, changed: &BTreeSet<String>) -> Vec<TaskName> {
        self.affected_indices(changed)
            .into_iter()
            .map(|i| self.tasks[i].name().to_string())
            .collect()
    }

    pub(crate) fn affected_indices(&self, changed: &BTreeSet<String>) -> Vec<usize> {
        let mut reached = vec![false; self.tasks.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();

        for (idx, task) in self.tasks.iter().enumerate() {
            if changed.iter().any(|path| task.consumes(path)) {
                reached[idx] = true;
                queue.push_back(idx);
            }
        }

        while let Some(idx) = queue.pop_front() {
            for consumer in self
                .graph
                .neighbors_directed(NodeIndex::new(idx), Direction::Outgoing)
            {
                let c = consumer.index();
                if !reached[c] {
                    reached[c] = true;
                    queue.push_back(c);
                }
            }
        }

        self.order.iter().copied().filter(|&i| reached[i]).collect()
    }

    pub(crate) fn order_indices(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn task_at(&self, idx: usize) -> &Task {
        &self.tasks[idx]
    }

    pub(crate) fn producer_indices(&self, idx: usize) -> Vec<usize> {
        let mut producers: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(idx), Direction::Incoming)
            .map(|n| n.index())
            .collect();
        producers.sort_unstable();
        producers
    }

    pub(crate) fn output_owner_index(&self, path: &str) -> Option<usize> {
        self.output_owner.get(path).copied().or_else(|| {
            self.mapped
                .iter()
                .copied()
                .find(|&i| self.tasks[i].output().produces(path))
        })
    }

    fn neighbours(&self, name: &str, dir: Direction) -> Vec<&str> {
        let Some(&idx) = self.by_name.get(name) else {
            return Vec::new();
        };
        let mut found: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(idx), dir)
            .map(|n| n.index())
            .collect();
        found.sort_unstable();
        found.into_iter().map(|i| self.tasks[i].name()).collect()
    }
}
