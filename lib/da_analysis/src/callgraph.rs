//! Graph representation of the calls reachable from the entry points.

use crate::repo::Repo;
use crate::xref::{EntryPoint, ReachabilitySet};
use da_dex::MethodRef;
use petgraph::dot::{Config, Dot};
use petgraph::prelude::*;
use petgraph::visit::{NodeRef, Reversed};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodStatus {
    /// Root method of an entry point.
    Entry,
    /// Defined by a loaded image.
    App,
    /// Defined by no loaded image.
    External,
}

#[derive(Debug, Clone)]
pub struct Method {
    reference: MethodRef,
    status: MethodStatus,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.reference.fmt(f)
    }
}

impl Method {
    #[must_use]
    pub const fn reference(&self) -> &MethodRef {
        &self.reference
    }

    #[must_use]
    pub const fn status(&self) -> MethodStatus {
        self.status
    }
}

/// Invocations from one method to another.
#[derive(Debug, Clone, Copy)]
pub struct Call {
    sites: usize,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.sites)
    }
}

#[derive(Debug)]
pub struct CallGraph {
    inner: DiGraph<Method, Call>,
}

impl CallGraph {
    /// Builds the graph of the reachable methods, with an edge for every
    /// invocation made by a defined one.
    #[must_use]
    pub fn build(repo: &Repo, entry_points: &[EntryPoint], reachable: &ReachabilitySet) -> Self {
        let mut cg: DiGraph<Method, Call> = DiGraph::new();
        let mut nodes_map: BTreeMap<&MethodRef, NodeIndex> = BTreeMap::new();

        for reference in reachable.iter() {
            let status = if entry_points.iter().any(|e| e.roots.contains(reference)) {
                MethodStatus::Entry
            } else if repo.resolve_method(reference).is_some() {
                MethodStatus::App
            } else {
                MethodStatus::External
            };
            nodes_map.insert(
                reference,
                cg.add_node(Method {
                    reference: reference.clone(),
                    status,
                }),
            );
        }

        for (_, method) in reachable.defined(repo) {
            let Some(src) = nodes_map.get(&method.reference) else {
                continue;
            };
            for target in &method.invocations {
                let Some(dst) = nodes_map.get(target) else {
                    continue;
                };
                match cg.find_edge(*src, *dst) {
                    Some(edge) => cg[edge].sites += 1,
                    None => {
                        cg.add_edge(*src, *dst, Call { sites: 1 });
                    }
                }
            }
        }

        Self { inner: cg }
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  rankdir=LR;\n");
        // writing to a String cannot fail
        let _ = write!(
            res,
            "{}",
            Dot::with_attr_getters(
                &self.inner,
                &[Config::GraphContentOnly],
                &|_, _| String::new(),
                &|_, node| {
                    let color = match node.weight().status {
                        MethodStatus::Entry => "green",
                        MethodStatus::App => "black",
                        MethodStatus::External => "blue",
                    };
                    format!("color={color},shape=box")
                }
            )
        );
        res.push('}');
        res
    }

    /// Keeps the methods matching `predicate` and their transitive
    /// callers, so that every path from an entry point to them remains.
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Method) -> bool,
    {
        // node ids must survive removals
        let mut stable_graph: StableDiGraph<_, _> = self.inner.clone().into();
        let mut to_remove: BTreeSet<NodeIndex> = stable_graph.node_indices().collect();

        let reversed = Reversed(&stable_graph);
        let mut dfs = Dfs::empty(reversed);
        for id in stable_graph.node_indices() {
            if predicate(&stable_graph[id]) {
                dfs.move_to(id);
                while let Some(keep_id) = dfs.next(reversed) {
                    to_remove.remove(&keep_id);
                }
            }
        }
        stable_graph.retain_nodes(|_, id| !to_remove.contains(&id));

        Self {
            inner: stable_graph.into(),
        }
    }

    pub fn iter_methods(&self) -> impl Iterator<Item = &Method> {
        self.inner.node_weights()
    }

    /// Methods invoked by `reference`, if it is part of the graph.
    pub fn callees<'a>(&'a self, reference: &'a MethodRef) -> impl Iterator<Item = &'a Method> + 'a {
        self.inner
            .node_indices()
            .filter(move |id| &self.inner[*id].reference == reference)
            .flat_map(move |id| self.inner.neighbors_directed(id, Outgoing))
            .map(move |id| &self.inner[id])
    }

    #[must_use]
    pub fn nb_methods(&self) -> usize {
        self.inner.node_count()
    }

    /// Number of caller to callee pairs.
    #[must_use]
    pub fn nb_calls(&self) -> usize {
        self.inner.edge_count()
    }
}
