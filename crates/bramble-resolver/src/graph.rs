//! The frozen output of a resolution.

use std::collections::{BTreeMap, HashSet};

use bramble_core::recipe::DependencyEdge;
use bramble_core::spec::Spec;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

/// A build-only edge onto an ancestor that was already chosen and satisfied
/// the edge. It is recorded but kept out of the graph so the graph stays
/// acyclic.
#[derive(Debug, Clone, PartialEq)]
pub struct BackEdge {
    pub from: String,
    pub to: String,
    pub edge: DependencyEdge,
}

/// An acyclic graph of concrete specs, one per package name.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    graph: DiGraph<Spec, DependencyEdge>,
    index: BTreeMap<String, NodeIndex>,
    root: NodeIndex,
    /// Dependencies before dependents.
    order: Vec<NodeIndex>,
    back_edges: Vec<BackEdge>,
}

impl ResolvedGraph {
    /// Freeze specs and edges into a graph and compute DAG hashes.
    ///
    /// `specs[0]` is the root. Returns the names on a cycle if the edges
    /// are not acyclic.
    pub fn freeze(
        specs: Vec<Spec>,
        edges: Vec<(usize, usize, DependencyEdge)>,
        back_edges: Vec<BackEdge>,
    ) -> Result<Self, String> {
        let mut graph = DiGraph::new();
        let mut index = BTreeMap::new();
        let nodes: Vec<NodeIndex> = specs
            .into_iter()
            .map(|spec| {
                let name = spec.name.clone();
                let idx = graph.add_node(spec);
                index.insert(name, idx);
                idx
            })
            .collect();
        let root = *nodes.first().ok_or_else(|| "empty graph".to_string())?;
        for (from, to, edge) in edges {
            graph.add_edge(nodes[from], nodes[to], edge);
        }

        let mut order = toposort(&graph, None)
            .map_err(|cycle| format!("cycle through `{}`", graph[cycle.node_id()].name))?;
        order.reverse();

        for &idx in &order {
            let mut children: Vec<(String, String)> = graph
                .edges_directed(idx, Direction::Outgoing)
                .map(|e| {
                    let child = &graph[e.target()];
                    (child.name.clone(), child.dag_hash.clone())
                })
                .collect();
            children.sort();
            children.dedup();
            let hash = graph[idx].compute_hash(children.iter().map(|(_, h)| h.as_str()));
            graph[idx].dag_hash = hash;
        }

        Ok(Self {
            graph,
            index,
            root,
            order,
            back_edges,
        })
    }

    pub fn root(&self) -> &Spec {
        &self.graph[self.root]
    }

    pub fn get(&self, name: &str) -> Option<&Spec> {
        self.index.get(name).map(|&idx| &self.graph[idx])
    }

    /// Every spec, dependencies before the specs that need them.
    pub fn nodes(&self) -> Vec<&Spec> {
        self.order.iter().map(|&idx| &self.graph[idx]).collect()
    }

    /// Included edges out of `name`, in declaration order.
    pub fn edges_of(&self, name: &str) -> Vec<(&DependencyEdge, &Spec)> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), e.weight(), &self.graph[e.target()]))
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges.into_iter().map(|(_, edge, spec)| (edge, spec)).collect()
    }

    /// Names of the specs with an edge into `name`, sorted.
    pub fn dependents_of(&self, name: &str) -> Vec<&Spec> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut parents: Vec<&Spec> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|p| &self.graph[p])
            .collect();
        parents.sort_by(|a, b| a.name.cmp(&b.name));
        parents.dedup_by(|a, b| a.name == b.name);
        parents
    }

    pub fn back_edges(&self) -> &[BackEdge] {
        &self.back_edges
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Distinct children of a node with their merged edge kinds, in first
    /// declaration order.
    fn children(&self, idx: NodeIndex) -> Vec<(NodeIndex, String)> {
        let mut children: Vec<(NodeIndex, Vec<&DependencyEdge>)> = Vec::new();
        let spec = &self.graph[idx];
        for (edge, child) in self.edges_of(&spec.name) {
            let child_idx = self.index[&child.name];
            match children.iter_mut().find(|(c, _)| *c == child_idx) {
                Some((_, edges)) => edges.push(edge),
                None => children.push((child_idx, vec![edge])),
            }
        }
        children
            .into_iter()
            .map(|(child, edges)| {
                let kinds: std::collections::BTreeSet<_> =
                    edges.iter().flat_map(|e| e.kinds.iter().copied()).collect();
                (child, bramble_core::recipe::kinds_label(&kinds))
            })
            .collect()
    }

    /// Render the graph as an indented tree. Shared dependencies are printed
    /// under every parent.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        let root = &self.graph[self.root];
        output.push_str(&format!("{root} [{}]\n", root.short_hash()));

        let children = self.children(self.root);
        let count = children.len();
        let mut visited = HashSet::new();
        visited.insert(self.root);
        for (i, (child, kinds)) in children.iter().enumerate() {
            self.print_subtree(
                &mut output,
                *child,
                kinds,
                "",
                i + 1 == count,
                1,
                max_depth,
                &mut visited,
            );
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        kinds: &str,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let spec = &self.graph[idx];
        output.push_str(&format!("{prefix}{connector}{spec} ({kinds})\n"));

        if max_depth.is_some_and(|max| depth >= max) {
            return;
        }
        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let children = self.children(idx);
        let count = children.len();
        for (i, (child, kinds)) in children.iter().enumerate() {
            self.print_subtree(
                output,
                *child,
                kinds,
                &child_prefix,
                i + 1 == count,
                depth + 1,
                max_depth,
                visited,
            );
        }

        visited.remove(&idx);
    }

    /// The first path from the root to `name`, following edges in
    /// declaration order. Answers "why is this in the graph".
    pub fn find_path(&self, name: &str) -> Option<Vec<&Spec>> {
        let target = *self.index.get(name)?;
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.dfs_path(self.root, target, &mut path, &mut visited) {
            Some(path.iter().map(|&idx| &self.graph[idx]).collect())
        } else {
            None
        }
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for (child, _) in self.children(current) {
            if self.dfs_path(child, target, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// A serializable view for machine-readable output.
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .nodes()
            .into_iter()
            .map(|spec| NodeSnapshot {
                name: spec.name.clone(),
                version: spec.version.to_string(),
                commit: spec.commit.clone(),
                variants: spec
                    .variants
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string()))
                    .collect(),
                hash: spec.dag_hash.clone(),
                dependencies: self
                    .edges_of(&spec.name)
                    .into_iter()
                    .map(|(edge, child)| EdgeSnapshot {
                        name: child.name.clone(),
                        kinds: edge.kinds.iter().map(ToString::to_string).collect(),
                        declared: edge.to_string(),
                    })
                    .collect(),
            })
            .collect();
        GraphSnapshot {
            root: self.root().name.clone(),
            nodes,
            back_edges: self
                .back_edges
                .iter()
                .map(|b| BackEdgeSnapshot {
                    from: b.from.clone(),
                    to: b.to.clone(),
                    declared: b.edge.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSnapshot {
    pub root: String,
    pub nodes: Vec<NodeSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub back_edges: Vec<BackEdgeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub variants: BTreeMap<String, String>,
    pub hash: String,
    pub dependencies: Vec<EdgeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSnapshot {
    pub name: String,
    pub kinds: Vec<String>,
    pub declared: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackEdgeSnapshot {
    pub from: String,
    pub to: String,
    pub declared: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bramble_core::variant::VariantAssignment;
    use bramble_core::version::Version;

    fn spec(name: &str, version: &str) -> Spec {
        Spec::new(name, Version::parse(version).unwrap(), VariantAssignment::new())
    }

    fn edge(target: &str) -> DependencyEdge {
        DependencyEdge::parse(target).unwrap()
    }

    // app -> lib -> zlib, app -> zlib
    fn diamond() -> ResolvedGraph {
        ResolvedGraph::freeze(
            vec![spec("app", "1.0"), spec("lib", "2.0"), spec("zlib", "1.3")],
            vec![(0, 1, edge("lib")), (0, 2, edge("zlib")), (1, 2, edge("zlib"))],
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn nodes_are_dependencies_first() {
        let graph = diamond();
        let names: Vec<&str> = graph.nodes().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), 3);
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("zlib") < pos("lib"));
        assert!(pos("lib") < pos("app"));
    }

    #[test]
    fn edges_in_declaration_order() {
        let graph = diamond();
        let targets: Vec<&str> = graph
            .edges_of("app")
            .iter()
            .map(|(_, s)| s.name.as_str())
            .collect();
        assert_eq!(targets, vec!["lib", "zlib"]);
        assert!(graph.edges_of("missing").is_empty());
    }

    #[test]
    fn hashes_cover_children() {
        let graph = diamond();
        let other = ResolvedGraph::freeze(
            vec![spec("app", "1.0"), spec("lib", "2.0"), spec("zlib", "1.2")],
            vec![(0, 1, edge("lib")), (0, 2, edge("zlib")), (1, 2, edge("zlib"))],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(graph.root().dag_hash.len(), 64);
        assert_ne!(graph.root().dag_hash, other.root().dag_hash);
        assert_eq!(graph.root().dag_hash, diamond().root().dag_hash);
    }

    #[test]
    fn tree_and_path() {
        let graph = diamond();
        let tree = graph.print_tree(None);
        assert!(tree.starts_with("app@1.0 ["));
        assert!(tree.contains("├── lib@2.0 (build,link)"));
        assert!(tree.contains("│   └── zlib@1.3 (build,link)"));
        assert!(tree.contains("└── zlib@1.3 (build,link)"));

        let shallow = graph.print_tree(Some(1));
        assert!(!shallow.contains("│   └── zlib"));

        let path: Vec<&str> = graph
            .find_path("zlib")
            .unwrap()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(path, vec!["app", "lib", "zlib"]);
        assert!(graph.find_path("cmake").is_none());
    }

    #[test]
    fn dependents_are_sorted() {
        let graph = diamond();
        let parents: Vec<&str> = graph
            .dependents_of("zlib")
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(parents, vec!["app", "lib"]);
    }

    #[test]
    fn freeze_rejects_cycles() {
        let result = ResolvedGraph::freeze(
            vec![spec("a", "1"), spec("b", "1")],
            vec![(0, 1, edge("b")), (1, 0, edge("a"))],
            Vec::new(),
        );
        assert!(result.is_err());
    }
}
