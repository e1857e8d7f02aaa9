// src/pipeline/graph.rs

//! Arena-backed module graph.
//!
//! Nodes live in a `Vec` and are addressed by [`ModuleId`], assigned in
//! discovery order. Cycles are allowed: an edge may point at any node,
//! including one discovered earlier.

use std::collections::HashMap;

use crate::pipeline::module::SourceModule;

/// Index of a module in the arena. Stable for one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

/// Where a specifier resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edge {
    Module(ModuleId),
    /// Left to the host environment.
    External(String),
}

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub module: SourceModule,
    /// Transformed output for the current variant.
    pub code: String,
    /// `(specifier, target)` in specifier order.
    pub edges: Vec<(String, Edge)>,
}

#[derive(Debug, Default, Clone)]
pub struct ModuleGraph {
    nodes: Vec<ModuleNode>,
    by_path: HashMap<String, ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly discovered module. Returns the existing id if the path
    /// is already present, without touching that node.
    pub fn insert(&mut self, module: SourceModule, code: String) -> ModuleId {
        if let Some(id) = self.by_path.get(&module.path) {
            return *id;
        }
        let id = ModuleId(self.nodes.len());
        self.by_path.insert(module.path.clone(), id);
        self.nodes.push(ModuleNode {
            module,
            code,
            edges: Vec::new(),
        });
        id
    }

    pub fn add_edge(&mut self, from: ModuleId, specifier: impl Into<String>, to: Edge) {
        if let Some(node) = self.nodes.get_mut(from.0) {
            node.edges.push((specifier.into(), to));
        }
    }

    pub fn id_of(&self, path: &str) -> Option<ModuleId> {
        self.by_path.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn node(&self, id: ModuleId) -> Option<&ModuleNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = (ModuleId, &ModuleNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ModuleId(i), n))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.module.path.as_str())
    }

    /// Dependency-first order starting from `root`.
    ///
    /// Post-order DFS visiting edges in specifier order, so ties fall back to
    /// discovery order. A back edge to a module still on the stack is skipped,
    /// which breaks cycles deterministically.
    pub fn bundle_order(&self, root: ModuleId) -> Vec<ModuleId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        if root.0 >= self.nodes.len() {
            return order;
        }

        // (node, next edge index)
        let mut stack: Vec<(ModuleId, usize)> = vec![(root, 0)];
        visited[root.0] = true;

        while let Some((id, edge_idx)) = stack.pop() {
            let edges = &self.nodes[id.0].edges;
            let next = edges[edge_idx.min(edges.len())..]
                .iter()
                .enumerate()
                .find_map(|(offset, (_, edge))| match edge {
                    Edge::Module(dep) if !visited[dep.0] => Some((edge_idx + offset, *dep)),
                    _ => None,
                });

            match next {
                Some((pos, dep)) => {
                    stack.push((id, pos + 1));
                    visited[dep.0] = true;
                    stack.push((dep, 0));
                }
                None => order.push(id),
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(graph: &mut ModuleGraph, path: &str) -> ModuleId {
        graph.insert(SourceModule::new(path, ""), String::new())
    }

    #[test]
    fn dependencies_come_first_in_specifier_order() {
        let mut g = ModuleGraph::new();
        let app = add(&mut g, "app.js");
        let a = add(&mut g, "a.js");
        let b = add(&mut g, "b.js");
        let shared = add(&mut g, "shared.js");
        g.add_edge(app, "./a", Edge::Module(a));
        g.add_edge(app, "react", Edge::External("react".into()));
        g.add_edge(app, "./b", Edge::Module(b));
        g.add_edge(a, "./shared", Edge::Module(shared));
        g.add_edge(b, "./shared", Edge::Module(shared));

        assert_eq!(g.bundle_order(app), vec![shared, a, b, app]);
    }

    #[test]
    fn cycles_visit_each_module_once() {
        let mut g = ModuleGraph::new();
        let a = add(&mut g, "a.js");
        let b = add(&mut g, "b.js");
        g.add_edge(a, "./b", Edge::Module(b));
        g.add_edge(b, "./a", Edge::Module(a));

        assert_eq!(g.bundle_order(a), vec![b, a]);
    }

    #[test]
    fn reinserting_a_path_keeps_the_first_node() {
        let mut g = ModuleGraph::new();
        let first = g.insert(SourceModule::new("a.js", "one"), "one".into());
        let second = g.insert(SourceModule::new("a.js", "two"), "two".into());
        assert_eq!(first, second);
        assert_eq!(g.len(), 1);
        assert_eq!(g.node(first).map(|n| n.code.as_str()), Some("one"));
    }
}
