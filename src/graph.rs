//! Dependency graph algorithms over job/task names
//!
//! Nodes live in an arena indexed by integer; edges point from a node to the
//! nodes it depends on. All traversals use explicit stacks and state arrays,
//! and visit nodes and edges in name order so results are deterministic.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnStack,
    Done,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<Vec<usize>>,
}

/// Longest dependency chain, listed dependency-first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CriticalPath {
    pub tasks: Vec<String>,
    pub length: usize,
    /// True when cycle-closing edges were ignored to compute the path
    pub cycle_edges_removed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphAnalysis {
    pub node_count: usize,
    pub edge_count: usize,
    pub cycles: Vec<Vec<String>>,
    pub critical_path: CriticalPath,
    /// Level number to the names at that level; a parallelism heuristic only
    pub levels: BTreeMap<usize, Vec<String>>,
}

impl GraphAnalysis {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}

struct Traversal {
    cycles: Vec<Vec<usize>>,
    back_edges: HashSet<(usize, usize)>,
}

/// Rotation of a cycle that starts at its smallest node id
fn canonical_rotation(cycle: &[usize]) -> Vec<usize> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map_or(0, |(i, _)| i);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a name → dependencies map plus extra isolated nodes
    pub fn from_dependencies<'a, I>(nodes: I, dependencies: &BTreeMap<String, Vec<String>>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut graph = Self::new();
        for name in nodes {
            graph.add_node(name);
        }
        for (name, deps) in dependencies {
            graph.add_node(name);
            for dep in deps {
                graph.add_edge(name, dep);
            }
        }
        graph
    }

    pub fn add_node(&mut self, name: &str) -> usize {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.edges.push(Vec::new());
        id
    }

    /// Adds "`from` depends on `to`", creating either node if needed
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.index
            .get(name)
            .map(|&id| self.edges[id].iter().map(|&d| self.names[d].as_str()).collect())
            .unwrap_or_default()
    }

    fn ordered_nodes(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.names.len()).collect();
        order.sort_by(|&a, &b| self.names[a].cmp(&self.names[b]));
        order
    }

    fn ordered_edges(&self) -> Vec<Vec<usize>> {
        self.edges
            .iter()
            .map(|deps| {
                let mut deps = deps.clone();
                deps.sort_by(|&a, &b| self.names[a].cmp(&self.names[b]));
                deps
            })
            .collect()
    }

    fn traverse(&self, edges: &[Vec<usize>]) -> Traversal {
        let n = self.names.len();
        let mut state = vec![Visit::Unvisited; n];
        let mut position: Vec<Option<usize>> = vec![None; n];
        let mut path: Vec<usize> = Vec::new();
        let mut cycles = Vec::new();
        let mut seen_cycles: HashSet<Vec<usize>> = HashSet::new();
        let mut back_edges = HashSet::new();

        for root in self.ordered_nodes() {
            if state[root] != Visit::Unvisited {
                continue;
            }

            state[root] = Visit::OnStack;
            position[root] = Some(path.len());
            path.push(root);
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                if frame.1 < edges[node].len() {
                    let dep = edges[node][frame.1];
                    frame.1 += 1;
                    match state[dep] {
                        Visit::Unvisited => {
                            state[dep] = Visit::OnStack;
                            position[dep] = Some(path.len());
                            path.push(dep);
                            stack.push((dep, 0));
                        }
                        Visit::OnStack => {
                            if let Some(start) = position[dep] {
                                let cycle = path[start..].to_vec();
                                if seen_cycles.insert(canonical_rotation(&cycle)) {
                                    cycles.push(cycle);
                                }
                            }
                            back_edges.insert((node, dep));
                        }
                        Visit::Done => {}
                    }
                } else {
                    state[node] = Visit::Done;
                    position[node] = None;
                    path.pop();
                    stack.pop();
                }
            }
        }

        Traversal { cycles, back_edges }
    }

    /// Every cycle closed by a back edge of the depth-first traversal
    ///
    /// Each cycle lists its members from the first revisited node onward,
    /// without repeating it at the end; a self-dependency is a one-element cycle.
    /// A cycle already reported in another rotation is not repeated.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let edges = self.ordered_edges();
        self.traverse(&edges)
            .cycles
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|id| self.names[id].clone()).collect())
            .collect()
    }

    /// Depth of every node (1 + deepest dependency) on the graph with
    /// cycle-closing edges removed, plus the chosen deepest dependency
    fn depths(&self) -> (Vec<usize>, Vec<Option<usize>>, bool) {
        let mut edges = self.ordered_edges();
        let traversal = self.traverse(&edges);
        let cycles_removed = !traversal.back_edges.is_empty();
        for (from, deps) in edges.iter_mut().enumerate() {
            deps.retain(|&to| !traversal.back_edges.contains(&(from, to)));
        }

        let n = self.names.len();
        let mut depth: Vec<Option<usize>> = vec![None; n];
        let mut deepest: Vec<Option<usize>> = vec![None; n];

        for root in self.ordered_nodes() {
            let mut stack = vec![(root, false)];
            while let Some((node, expanded)) = stack.pop() {
                if depth[node].is_some() {
                    continue;
                }
                if expanded {
                    let mut best: Option<(usize, usize)> = None;
                    for &dep in &edges[node] {
                        let d = depth[dep].unwrap_or(0);
                        if best.map_or(true, |(_, bd)| d > bd) {
                            best = Some((dep, d));
                        }
                    }
                    depth[node] = Some(1 + best.map_or(0, |(_, d)| d));
                    deepest[node] = best.map(|(dep, _)| dep);
                } else {
                    stack.push((node, true));
                    for &dep in edges[node].iter().rev() {
                        if depth[dep].is_none() {
                            stack.push((dep, false));
                        }
                    }
                }
            }
        }

        (
            depth.into_iter().map(|d| d.unwrap_or(1)).collect(),
            deepest,
            cycles_removed,
        )
    }

    /// Longest chain of dependencies
    ///
    /// Cycles are broken by dropping the edges that close them. Among equally
    /// deep candidates the lexicographically smallest name wins, both for the
    /// chain's top node and at every step down.
    pub fn critical_path(&self) -> CriticalPath {
        if self.is_empty() {
            return CriticalPath::default();
        }

        let (depth, deepest, cycle_edges_removed) = self.depths();

        let mut top: Option<usize> = None;
        for node in self.ordered_nodes() {
            if top.map_or(true, |t| depth[node] > depth[t]) {
                top = Some(node);
            }
        }

        let mut tasks = Vec::new();
        let mut current = top;
        while let Some(node) = current {
            tasks.push(self.names[node].clone());
            current = deepest[node];
        }
        tasks.reverse();

        CriticalPath {
            length: tasks.len(),
            tasks,
            cycle_edges_removed,
        }
    }

    /// Dependency level per node: 1 for nodes without dependencies
    pub fn levels(&self) -> BTreeMap<String, usize> {
        let (depth, _, _) = self.depths();
        self.names
            .iter()
            .cloned()
            .zip(depth)
            .collect()
    }

    /// Nodes grouped by level; nodes sharing a level have no path between them
    pub fn parallel_groups(&self) -> BTreeMap<usize, Vec<String>> {
        let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (name, level) in self.levels() {
            groups.entry(level).or_default().push(name);
        }
        groups
    }

    pub fn analyze(&self) -> GraphAnalysis {
        GraphAnalysis {
            node_count: self.len(),
            edge_count: self.edge_count(),
            cycles: self.find_cycles(),
            critical_path: self.critical_path(),
            levels: self.parallel_groups(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        let mut deps = BTreeMap::new();
        for (name, targets) in edges {
            deps.insert(
                name.to_string(),
                targets.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            );
        }
        DependencyGraph::from_dependencies(std::iter::empty(), &deps)
    }

    #[test]
    fn test_three_node_cycle() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        let cycles = g.find_cycles();
        assert_eq!(cycles.len(), 1);
        let mut members = cycles[0].clone();
        members.sort();
        assert_eq!(members, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_self_loop_is_length_one_cycle() {
        let g = graph(&[("A", &["A"]), ("B", &[])]);
        let cycles = g.find_cycles();
        assert_eq!(cycles, vec![vec!["A".to_string()]]);
    }

    #[test]
    fn test_finds_every_back_edge_cycle() {
        let g = graph(&[("A", &["B"]), ("B", &["A", "C"]), ("C", &["B"]), ("D", &["D"])]);
        let cycles = g.find_cycles();
        assert_eq!(cycles.len(), 3);
        assert!(cycles.contains(&vec!["A".to_string(), "B".to_string()]));
        assert!(cycles.contains(&vec!["B".to_string(), "C".to_string()]));
        assert!(cycles.contains(&vec!["D".to_string()]));
    }

    #[test]
    fn test_two_back_edges_into_one_node() {
        let g = graph(&[("A", &["B"]), ("B", &["A", "C"]), ("C", &["A"])]);
        let cycles = g.find_cycles();
        assert_eq!(
            cycles,
            vec![
                vec!["A".to_string(), "B".to_string()],
                vec!["A".to_string(), "B".to_string(), "C".to_string()],
            ]
        );
    }

    #[test]
    fn test_canonical_rotation() {
        assert_eq!(canonical_rotation(&[2, 0, 1]), vec![0, 1, 2]);
        assert_eq!(canonical_rotation(&[1, 2, 0]), vec![0, 1, 2]);
        assert_eq!(canonical_rotation(&[0, 1, 2]), vec![0, 1, 2]);
        assert_ne!(canonical_rotation(&[0, 2, 1]), vec![0, 1, 2]);
        assert_eq!(canonical_rotation(&[4]), vec![4]);
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let g = graph(&[("app", &["lib1", "lib2"]), ("lib1", &["base"]), ("lib2", &["base"])]);
        assert!(g.find_cycles().is_empty());
        assert_eq!(g.len(), 4);
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn test_critical_path() {
        let g = graph(&[("A", &[]), ("B", &["A"]), ("C", &["B"]), ("D", &["A"])]);
        let path = g.critical_path();
        assert_eq!(path.length, 3);
        assert_eq!(path.tasks, vec!["A", "B", "C"]);
        assert!(!path.cycle_edges_removed);
    }

    #[test]
    fn test_critical_path_tie_break_is_lexicographic() {
        let g = graph(&[("x", &["b", "a"]), ("y", &["a"])]);
        let path = g.critical_path();
        assert_eq!(path.tasks, vec!["a", "x"]);
    }

    #[test]
    fn test_critical_path_on_cycle_terminates() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        let path = g.critical_path();
        assert!(path.cycle_edges_removed);
        assert_eq!(path.length, 3);
    }

    #[test]
    fn test_levels_and_parallel_groups() {
        let g = graph(&[("A", &[]), ("B", &["A"]), ("C", &["B"]), ("D", &["A"])]);
        let levels = g.levels();
        assert_eq!(levels["A"], 1);
        assert_eq!(levels["B"], 2);
        assert_eq!(levels["D"], 2);
        assert_eq!(levels["C"], 3);

        let groups = g.parallel_groups();
        assert_eq!(groups[&2], vec!["B", "D"]);
    }

    #[test]
    fn test_isolated_and_dangling_nodes() {
        let mut deps = BTreeMap::new();
        deps.insert("build".to_string(), vec!["missing".to_string()]);
        let g = DependencyGraph::from_dependencies(["lint"], &deps);
        assert!(g.contains("lint"));
        assert!(g.contains("missing"));
        assert_eq!(g.dependencies_of("build"), vec!["missing"]);
        assert_eq!(g.levels()["lint"], 1);
    }

    #[test]
    fn test_empty_graph() {
        let g = DependencyGraph::new();
        let analysis = g.analyze();
        assert_eq!(analysis.node_count, 0);
        assert!(analysis.critical_path.tasks.is_empty());
        assert!(!analysis.has_cycles());
    }

    #[test]
    fn test_long_chain_does_not_overflow_stack() {
        let mut g = DependencyGraph::new();
        for i in 1..50_000 {
            g.add_edge(&format!("t{:05}", i), &format!("t{:05}", i - 1));
        }
        assert!(g.find_cycles().is_empty());
        assert_eq!(g.critical_path().length, 50_000);
    }
}
