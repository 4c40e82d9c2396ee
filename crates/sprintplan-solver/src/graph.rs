//! Prerequisite graph construction and cycle diagnosis.
//!
//! The declared edges (successor -> prerequisites) are resolved against the
//! normalized task set before scheduling: dangling references are dropped
//! with a warning, edges whose prerequisite is already closed are folded
//! away as satisfied, and every task sitting on a cycle is diagnosed up
//! front so the placement pass never has to break one.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sprintplan_core::{DependencyEdge, Task, TaskId, TaskState};
use tracing::{debug, warn};

/// Resolved prerequisite relation over the schedulable task set
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    /// successor -> prerequisites, both schedulable
    prereqs: BTreeMap<TaskId, BTreeSet<TaskId>>,
    /// Every resolved edge, including those folded away as satisfied
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Resolve declared edges against the normalized task set.
    ///
    /// `declared` maps each successor to its prerequisite list; duplicates
    /// are idempotent. `tasks` is the full normalized set, closed tasks
    /// included.
    pub fn build(declared: &BTreeMap<TaskId, Vec<TaskId>>, tasks: &[Task]) -> Self {
        let states: HashMap<TaskId, TaskState> =
            tasks.iter().map(|t| (t.id, t.state)).collect();

        let mut prereqs: BTreeMap<TaskId, BTreeSet<TaskId>> = BTreeMap::new();
        let mut edges = Vec::new();

        for (&successor, prerequisites) in declared {
            let Some(&successor_state) = states.get(&successor) else {
                warn!(task = successor, "dependency successor not in task set, edges dropped");
                continue;
            };

            for &prerequisite in prerequisites {
                let Some(&prereq_state) = states.get(&prerequisite) else {
                    warn!(
                        task = successor,
                        prerequisite, "dangling prerequisite reference, edge dropped"
                    );
                    continue;
                };

                edges.push(DependencyEdge {
                    successor,
                    prerequisite,
                });

                if successor_state == TaskState::Closed {
                    // Closed successors are never scheduled
                    continue;
                }
                if prereq_state == TaskState::Closed {
                    debug!(
                        task = successor,
                        prerequisite, "prerequisite already closed, satisfied at sprint start"
                    );
                    continue;
                }
                prereqs.entry(successor).or_default().insert(prerequisite);
            }
        }

        edges.sort();
        edges.dedup();
        Self { prereqs, edges }
    }

    /// Schedulable prerequisites of a task (closed ones are already folded)
    pub fn prerequisites(&self, task_id: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.prereqs
            .get(&task_id)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Every resolved edge, sorted, for the report
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// All tasks participating in any dependency cycle.
    ///
    /// Iterative Tarjan SCC over the prerequisite relation; a task is a
    /// cycle member iff its component has more than one node or it carries a
    /// self-loop. Roots are visited in ascending id order so the diagnosis
    /// is deterministic.
    pub fn cycle_members(&self) -> BTreeSet<TaskId> {
        let mut nodes: BTreeSet<TaskId> = self.prereqs.keys().copied().collect();
        for set in self.prereqs.values() {
            nodes.extend(set.iter().copied());
        }

        let mut members = BTreeSet::new();
        let mut next_index = 0usize;
        let mut index: HashMap<TaskId, usize> = HashMap::new();
        let mut lowlink: HashMap<TaskId, usize> = HashMap::new();
        let mut on_stack: BTreeSet<TaskId> = BTreeSet::new();
        let mut stack: Vec<TaskId> = Vec::new();

        // Explicit call frames: (node, next neighbor position)
        let mut frames: Vec<(TaskId, usize)> = Vec::new();

        let neighbors = |id: TaskId| -> Vec<TaskId> {
            self.prereqs
                .get(&id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };

        for &root in &nodes {
            if index.contains_key(&root) {
                continue;
            }

            index.insert(root, next_index);
            lowlink.insert(root, next_index);
            next_index += 1;
            stack.push(root);
            on_stack.insert(root);
            frames.push((root, 0));

            while let Some(&mut (v, ref mut pos)) = frames.last_mut() {
                let succ = neighbors(v);
                if *pos < succ.len() {
                    let w = succ[*pos];
                    *pos += 1;
                    if !index.contains_key(&w) {
                        index.insert(w, next_index);
                        lowlink.insert(w, next_index);
                        next_index += 1;
                        stack.push(w);
                        on_stack.insert(w);
                        frames.push((w, 0));
                    } else if on_stack.contains(&w) {
                        let w_index = index[&w];
                        lowlink.entry(v).and_modify(|low| *low = (*low).min(w_index));
                    }
                    continue;
                }

                frames.pop();
                let v_lowlink = lowlink[&v];
                if let Some(&(parent, _)) = frames.last() {
                    lowlink.entry(parent).and_modify(|low| *low = (*low).min(v_lowlink));
                }

                if v_lowlink == index[&v] {
                    // v is the root of a strongly-connected component
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack.remove(&w);
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    let self_loop = component.len() == 1
                        && self
                            .prereqs
                            .get(&v)
                            .is_some_and(|set| set.contains(&v));
                    if component.len() > 1 || self_loop {
                        warn!(tasks = ?component, "dependency cycle detected");
                        members.extend(component);
                    }
                }
            }
        }

        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sprintplan_core::Task;

    fn declared(pairs: &[(TaskId, &[TaskId])]) -> BTreeMap<TaskId, Vec<TaskId>> {
        pairs
            .iter()
            .map(|(succ, prereqs)| (*succ, prereqs.to_vec()))
            .collect()
    }

    fn backend_task(id: TaskId) -> Task {
        Task::new(id, format!("[BE] task {id}"))
    }

    #[test]
    fn dangling_references_are_dropped() {
        let tasks = vec![backend_task(1)];
        let graph = DependencyGraph::build(&declared(&[(1, &[99]), (98, &[1])]), &tasks);

        assert_eq!(graph.prerequisites(1).count(), 0);
        assert!(graph.edges().is_empty());
        assert!(graph.cycle_members().is_empty());
    }

    #[test]
    fn closed_prerequisites_are_folded_away() {
        let tasks = vec![
            backend_task(1).state(TaskState::Closed),
            backend_task(2),
        ];
        let graph = DependencyGraph::build(&declared(&[(2, &[1])]), &tasks);

        // The edge is kept for the report but not for scheduling
        assert_eq!(
            graph.edges(),
            &[DependencyEdge {
                successor: 2,
                prerequisite: 1
            }]
        );
        assert_eq!(graph.prerequisites(2).count(), 0);
    }

    #[test]
    fn two_cycle_is_fully_diagnosed() {
        let tasks = vec![backend_task(1), backend_task(2), backend_task(3)];
        let graph = DependencyGraph::build(&declared(&[(1, &[2]), (2, &[1]), (3, &[1])]), &tasks);

        let members = graph.cycle_members();
        assert_eq!(members, BTreeSet::from([1, 2]));
        // Task 3 depends on the cycle but is not on it
        assert!(!members.contains(&3));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let tasks = vec![backend_task(1)];
        let graph = DependencyGraph::build(&declared(&[(1, &[1])]), &tasks);
        assert_eq!(graph.cycle_members(), BTreeSet::from([1]));
    }

    #[test]
    fn long_cycle_and_chain_coexist() {
        let tasks: Vec<Task> = (1..=6).map(backend_task).collect();
        // 1 -> 2 -> 3 -> 1 is a cycle; 4 -> 5 -> 6 is a clean chain
        let graph = DependencyGraph::build(
            &declared(&[(1, &[2]), (2, &[3]), (3, &[1]), (4, &[5]), (5, &[6])]),
            &tasks,
        );
        assert_eq!(graph.cycle_members(), BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn duplicate_edges_are_idempotent() {
        let tasks = vec![backend_task(1), backend_task(2)];
        let graph = DependencyGraph::build(&declared(&[(2, &[1, 1, 1])]), &tasks);
        assert_eq!(graph.prerequisites(2).collect::<Vec<_>>(), vec![1]);
        assert_eq!(graph.edges().len(), 1);
    }
}
