//! Wire graph construction and rendering.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use tether_core::{Repository, ResourceId, WireMap};

/// A resource in the wire graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WireNode {
    #[serde(skip)]
    pub id: ResourceId,
    pub name: String,
    pub version: String,
    pub fragment: bool,
}

impl fmt::Display for WireNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)?;
        if self.fragment {
            f.write_str(" (fragment)")?;
        }
        Ok(())
    }
}

/// Edge label: what the requirer was wired to.
#[derive(Debug, Clone, Serialize)]
pub struct WireEdge {
    pub namespace: String,
    pub capability: String,
}

/// Serialized form of one wire, as emitted by [`WireGraph::to_json`].
#[derive(Debug, Serialize)]
struct WireRecord<'a> {
    requirer: &'a WireNode,
    provider: &'a WireNode,
    namespace: &'a str,
    capability: &'a str,
}

/// The resources touched by a resolve and the wires between them.
pub struct WireGraph {
    graph: DiGraph<WireNode, WireEdge>,
    index: HashMap<ResourceId, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl WireGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Build a graph from a wire map. `roots` are the resources trees start
    /// from; roots without wires still get a node.
    pub fn from_wires(repo: &Repository, wires: &WireMap, roots: &[ResourceId]) -> Self {
        let mut graph = Self::new();
        for root in roots {
            let idx = graph.add_node(repo, *root);
            if !graph.roots.contains(&idx) {
                graph.roots.push(idx);
            }
        }
        for (resource, list) in wires {
            let from = graph.add_node(repo, *resource);
            for wire in list {
                let to = graph.add_node(repo, wire.provider);
                let cap = repo.capability(wire.capability);
                graph.add_edge(
                    from,
                    to,
                    WireEdge {
                        namespace: cap.namespace.clone(),
                        capability: cap.to_string(),
                    },
                );
            }
        }
        graph
    }

    /// Add or retrieve the node of a resource.
    pub fn add_node(&mut self, repo: &Repository, id: ResourceId) -> NodeIndex {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let resource = repo.resource(id);
        let idx = self.graph.add_node(WireNode {
            id,
            name: resource.name.clone(),
            version: resource.version.to_string(),
            fragment: resource.fragment,
        });
        self.index.insert(id, idx);
        idx
    }

    /// Add a wire edge. Several wires to the same capability collapse into one.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: WireEdge) {
        let exists = self
            .graph
            .edges(from)
            .any(|e| e.target() == to && e.weight().capability == edge.capability);
        if !exists {
            self.graph.add_edge(from, to, edge);
        }
    }

    pub fn node(&self, idx: NodeIndex) -> &WireNode {
        &self.graph[idx]
    }

    /// Providers a node is wired to, without duplicates, in wire order.
    pub fn providers_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = HashSet::new();
        let mut out: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.target())
            .filter(|t| *t != idx && seen.insert(*t))
            .collect();
        // petgraph walks edges newest first.
        out.reverse();
        out
    }

    /// Resources wired to a node, without duplicates.
    pub fn requirers_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = HashSet::new();
        let mut out: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.source())
            .filter(|s| *s != idx && seen.insert(*s))
            .collect();
        out.reverse();
        out
    }

    /// Print one tree per root.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        for root in &self.roots {
            output.push_str(&format!("{}\n", self.graph[*root]));
            let mut visited = HashSet::new();
            visited.insert(*root);
            let providers = self.providers_of(*root);
            let count = providers.len();
            for (i, idx) in providers.iter().enumerate() {
                self.print_subtree(
                    &mut output,
                    *idx,
                    "",
                    i == count - 1,
                    1,
                    max_depth,
                    &mut visited,
                );
            }
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{}\n", self.graph[idx]));

        if max_depth.is_some_and(|max| depth >= max) || !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let providers = self.providers_of(idx);
        let count = providers.len();
        for (i, child) in providers.iter().enumerate() {
            self.print_subtree(
                output,
                *child,
                &child_prefix,
                i == count - 1,
                depth + 1,
                max_depth,
                visited,
            );
        }

        visited.remove(&idx);
    }

    /// Find a wire path from any root to the named resource.
    ///
    /// Accepts either `name version` or just `name`.
    pub fn find_path(&self, target: &str) -> Option<Vec<&WireNode>> {
        let target = self.resolve_key(target)?;
        for root in &self.roots {
            let mut path = Vec::new();
            let mut visited = HashSet::new();
            if self.dfs_path(*root, target, &mut path, &mut visited) {
                return Some(path.iter().map(|&idx| &self.graph[idx]).collect());
            }
        }
        None
    }

    fn resolve_key(&self, key: &str) -> Option<NodeIndex> {
        let mut by_name = None;
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            if format!("{} {}", node.name, node.version) == key {
                return Some(idx);
            }
            if by_name.is_none() && node.name == key {
                by_name = Some(idx);
            }
        }
        by_name
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
        for next in self.providers_of(current) {
            if self.dfs_path(next, target, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Print who is wired to the named resource, transitively.
    pub fn print_inverted_tree(&self, target: &str) -> String {
        let mut output = String::new();
        let Some(idx) = self.resolve_key(target) else {
            return output;
        };
        output.push_str(&format!("{}\n", self.graph[idx]));

        let mut visited = HashSet::new();
        visited.insert(idx);
        let requirers = self.requirers_of(idx);
        let count = requirers.len();
        for (i, req) in requirers.iter().enumerate() {
            self.print_inverted_subtree(&mut output, *req, "", i == count - 1, &mut visited);
        }
        output
    }

    fn print_inverted_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{}\n", self.graph[idx]));

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let requirers = self.requirers_of(idx);
        let count = requirers.len();
        for (i, req) in requirers.iter().enumerate() {
            self.print_inverted_subtree(output, *req, &child_prefix, i == count - 1, visited);
        }

        visited.remove(&idx);
    }

    /// Every wire as a JSON array of `{requirer, provider, namespace, capability}`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut records: Vec<WireRecord<'_>> = self
            .graph
            .edge_references()
            .map(|e| WireRecord {
                requirer: &self.graph[e.source()],
                provider: &self.graph[e.target()],
                namespace: &e.weight().namespace,
                capability: &e.weight().capability,
            })
            .collect();
        records.sort_by_key(|r| (r.requirer.id, r.provider.id, r.capability));
        serde_json::to_string_pretty(&records)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WireGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{ResourceBuilder, Version, Wire};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    /// app -> lib -> base, wired by package imports.
    fn chain() -> (Repository, WireMap, ResourceId) {
        let mut repo = Repository::new();
        let base = repo
            .add(ResourceBuilder::new("base", v("1.0")).export("base", v("1.0"), &[]))
            .unwrap();
        let lib = repo
            .add(
                ResourceBuilder::new("lib", v("2.0"))
                    .export("lib", v("2.0"), &[])
                    .import("base"),
            )
            .unwrap();
        let app = repo
            .add(ResourceBuilder::new("app", v("1.0")).import("lib"))
            .unwrap();

        let wire = |requirer: ResourceId, provider: ResourceId| Wire {
            requirer,
            requirement: repo.resource(requirer).requirements[0],
            provider,
            capability: repo.resource(provider).capabilities[3],
        };
        let mut wires = WireMap::new();
        wires.insert(app, vec![wire(app, lib)]);
        wires.insert(lib, vec![wire(lib, base)]);
        wires.insert(base, Vec::new());
        (repo, wires, app)
    }

    #[test]
    fn tree_printing() {
        let (repo, wires, app) = chain();
        let graph = WireGraph::from_wires(&repo, &wires, &[app]);
        assert_eq!(graph.len(), 3);

        let tree = graph.print_tree(None);
        assert_eq!(tree, "app 1.0.0\n└── lib 2.0.0\n    └── base 1.0.0\n");

        let shallow = graph.print_tree(Some(1));
        assert!(shallow.contains("lib 2.0.0"));
        assert!(!shallow.contains("base"));
    }

    #[test]
    fn find_path_by_name() {
        let (repo, wires, app) = chain();
        let graph = WireGraph::from_wires(&repo, &wires, &[app]);

        let path = graph.find_path("base").unwrap();
        let names: Vec<&str> = path.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["app", "lib", "base"]);
        assert!(graph.find_path("missing").is_none());
    }

    #[test]
    fn inverted_tree() {
        let (repo, wires, app) = chain();
        let graph = WireGraph::from_wires(&repo, &wires, &[app]);

        let inv = graph.print_inverted_tree("base 1.0.0");
        assert_eq!(inv, "base 1.0.0\n└── lib 2.0.0\n    └── app 1.0.0\n");
    }

    #[test]
    fn json_lists_every_wire() {
        let (repo, wires, app) = chain();
        let graph = WireGraph::from_wires(&repo, &wires, &[app]);

        let json: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["requirer"]["name"], "lib");
        assert_eq!(records[0]["provider"]["name"], "base");
        assert_eq!(records[0]["namespace"], "package");
    }
}
