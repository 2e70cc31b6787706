//! Concept dependency graph and the prerequisite index built from it.
//!
//! The graph document is a static JSON file of the shape
//! `{ "nodes": [{ "id": ... }], "links": [{ "source": ..., "target": ... }] }`
//! where each link reads "`source` is a prerequisite of `target`".
//!
//! [`PrerequisiteIndex`] is built once from that document and never mutated
//! afterwards, so it can be shared behind an `Arc` by every request handler.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a graph document.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to read graph file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse graph document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConceptNode {
    pub id: String,
}

/// A single dependency edge. `source` must be understood before `target`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConceptLink {
    pub source: String,
    pub target: String,
}

/// The on-disk graph document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConceptGraph {
    #[serde(default)]
    pub nodes: Vec<ConceptNode>,
    #[serde(default)]
    pub links: Vec<ConceptLink>,
}

impl ConceptGraph {
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| GraphError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }
}

/// Reverse adjacency over the concept graph: each dependent concept maps to
/// the list of its direct prerequisites, in edge order.
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteIndex {
    prerequisites: HashMap<String, Vec<String>>,
    concepts: Vec<String>,
}

impl PrerequisiteIndex {
    /// Build the index from `(prerequisite, dependent)` pairs.
    ///
    /// No acyclicity check is made. Cycles are tolerated at query time by the
    /// traversal's visited set.
    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let prerequisites = edges.into_iter().fold(
            HashMap::<String, Vec<String>>::new(),
            |mut map, (prerequisite, dependent)| {
                map.entry(dependent.into())
                    .or_default()
                    .push(prerequisite.into());
                map
            },
        );

        Self {
            prerequisites,
            concepts: Vec::new(),
        }
    }

    pub fn from_graph(graph: &ConceptGraph) -> Self {
        let mut index = Self::from_edges(
            graph
                .links
                .iter()
                .map(|link| (link.source.as_str(), link.target.as_str())),
        );
        index.concepts = graph.nodes.iter().map(|node| node.id.clone()).collect();
        index
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let graph = ConceptGraph::load(path)?;
        Ok(Self::from_graph(&graph))
    }

    /// Concept ids declared in the graph's node list, in document order.
    pub fn concepts(&self) -> &[String] {
        &self.concepts
    }

    pub fn direct_prerequisites(&self, concept: &str) -> &[String] {
        self.prerequisites
            .get(concept)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every transitive prerequisite of `target`, each exactly once.
    ///
    /// Post-order DFS with a single visited set for the whole query. A direct
    /// prerequisite is appended after its own subtree even when it was already
    /// visited through another branch; the accumulator is then reversed and
    /// deduplicated keeping the first occurrence.
    ///
    /// For a chain the nearest prerequisite comes first. Graphs with shared
    /// sub-dependencies are not guaranteed a topological order: for the
    /// diamond `C->A, C->B, A->T, B->T` the result is `[B, C, A]`.
    pub fn all_prerequisites(&self, target: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut post_order = Vec::new();
        self.collect(target, &mut visited, &mut post_order);

        let mut seen = HashSet::new();
        post_order
            .into_iter()
            .rev()
            .filter(|concept| seen.insert(*concept))
            .map(str::to_string)
            .collect()
    }

    fn collect<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        post_order: &mut Vec<&'a str>,
    ) {
        if !visited.insert(node) {
            return;
        }

        for prerequisite in self.direct_prerequisites(node) {
            self.collect(prerequisite, visited, post_order);
            post_order.push(prerequisite);
        }
    }
}
