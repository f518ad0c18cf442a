//! Structure-preserving maps between graphs.
use std::fmt::Display;

use crate::graph::Graph;

/// A map from the nodes and edges of a domain graph to those of a codomain graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Morphism {
    nodes: Vec<usize>,
    edges: Vec<usize>,
}

impl Morphism {
    pub fn new(nodes: Vec<usize>, edges: Vec<usize>) -> Morphism {
        Morphism { nodes, edges }
    }

    /// The identity on a graph with `nodes` nodes and `edges` edges.
    pub fn identity(nodes: usize, edges: usize) -> Morphism {
        Morphism {
            nodes: (0..nodes).collect(),
            edges: (0..edges).collect(),
        }
    }

    /// The image of node `node`.
    #[inline]
    pub fn node(&self, node: usize) -> usize {
        self.nodes[node]
    }

    /// The image of edge `edge`.
    #[inline]
    pub fn edge(&self, edge: usize) -> usize {
        self.edges[edge]
    }

    #[inline]
    pub fn node_map(&self) -> &[usize] {
        &self.nodes
    }

    #[inline]
    pub fn edge_map(&self) -> &[usize] {
        &self.edges
    }

    /// The inverse of a bijective morphism.
    pub fn inverse(&self) -> Morphism {
        let mut nodes = vec![usize::MAX; self.nodes.len()];
        for (i, n) in self.nodes.iter().enumerate() {
            nodes[*n] = i;
        }
        let mut edges = vec![usize::MAX; self.edges.len()];
        for (i, e) in self.edges.iter().enumerate() {
            edges[*e] = i;
        }
        Morphism { nodes, edges }
    }

    /// Apply `self` first and then `other`.
    pub fn then(&self, other: &Morphism) -> Morphism {
        Morphism {
            nodes: self.nodes.iter().map(|n| other.node(*n)).collect(),
            edges: self.edges.iter().map(|e| other.edge(*e)).collect(),
        }
    }

    /// Check that the morphism is an isomorphism from `dom` to `cod`: it must be
    /// bijective on nodes and edges, map every edge onto an edge with the same
    /// label between the images of its endpoints, and preserve node data.
    pub fn is_isomorphism<N: PartialEq, E: PartialEq>(
        &self,
        dom: &Graph<N, E>,
        cod: &Graph<N, E>,
    ) -> bool {
        if self.nodes.len() != dom.node_count()
            || self.edges.len() != dom.edge_count()
            || dom.node_count() != cod.node_count()
            || dom.edge_count() != cod.edge_count()
        {
            return false;
        }

        let mut seen = vec![false; cod.node_count()];
        for (i, &n) in self.nodes.iter().enumerate() {
            if n >= seen.len() || seen[n] || dom.node(i).data != cod.node(n).data {
                return false;
            }
            seen[n] = true;
        }

        let mut seen = vec![false; cod.edge_count()];
        for (i, &e) in self.edges.iter().enumerate() {
            if e >= seen.len() || seen[e] {
                return false;
            }
            seen[e] = true;

            let (de, ce) = (dom.edge(i), cod.edge(e));
            if ce.source != self.nodes[de.source]
                || ce.target != self.nodes[de.target]
                || ce.data != de.data
            {
                return false;
            }
        }

        true
    }
}

impl Display for Morphism {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, n) in self.nodes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "n{}->n{}", i, n)?;
        }
        for (i, e) in self.edges.iter().enumerate() {
            if i > 0 || !self.nodes.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "e{}->e{}", i, e)?;
        }
        write!(f, "}}")
    }
}
