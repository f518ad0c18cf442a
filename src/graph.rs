//! Directed labeled multigraphs, as consumed by the certificate engine.
//!
//! Nodes and edges are addressed by index. Every node carries data implementing
//! [NodeData], which decides its initial certificate: untyped nodes start from a
//! common seed, typed nodes from the hash of their type label and value nodes from
//! the hash of their embedded value.
//!
//! ```
//! use isocert::graph::{Graph, NodeLabel};
//!
//! let mut g = Graph::new();
//! let a = g.add_node(NodeLabel::typed("Cell"));
//! let b = g.add_node(NodeLabel::int(3));
//! g.add_edge(a, b, "val");
//! assert_eq!(g.outgoing(a).count(), 1);
//! ```
use ahash::RandomState;
use once_cell::sync::Lazy;
use smartstring::{LazyCompact, SmartString};
use std::{
    fmt::{Debug, Display},
    hash::{BuildHasher, Hash, Hasher},
};

/// A node in a graph, with arbitrary data.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Node<NodeData = Empty> {
    /// Arbitrary data associated with the node.
    pub data: NodeData,
    /// Indices of the edges incident to the node, in insertion order.
    /// A self-loop is listed once.
    pub edges: Vec<usize>,
}

/// A directed edge in a graph, with arbitrary data.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge<EdgeData = Empty> {
    pub source: usize,
    pub target: usize,
    /// The label of the edge.
    pub data: EdgeData,
}

impl<E> Edge<E> {
    /// Returns `true` iff the edge starts and ends in the same node.
    #[inline]
    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Empty data type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Empty;

impl Display for Empty {
    fn fmt(&self, _f: &mut std::fmt::Formatter) -> std::fmt::Result {
        Ok(())
    }
}

/// A data constant held by a value node.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataValue {
    Bool(bool),
    Int(i64),
    Str(SmartString<LazyCompact>),
}

impl Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DataValue::Bool(b) => write!(f, "{}", b),
            DataValue::Int(i) => write!(f, "{}", i),
            DataValue::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// The label of a node in a graph of a graph-transformation system.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeLabel {
    #[default]
    Untyped,
    /// A node with a type label.
    Type(SmartString<LazyCompact>),
    /// A value node, standing for a data constant.
    Value(DataValue),
}

impl NodeLabel {
    pub fn typed(label: &str) -> NodeLabel {
        NodeLabel::Type(label.into())
    }

    pub fn int(value: i64) -> NodeLabel {
        NodeLabel::Value(DataValue::Int(value))
    }

    pub fn string(value: &str) -> NodeLabel {
        NodeLabel::Value(DataValue::Str(value.into()))
    }

    pub fn bool(value: bool) -> NodeLabel {
        NodeLabel::Value(DataValue::Bool(value))
    }

    /// Returns `true` iff the node stands for a data constant.
    pub fn is_value(&self) -> bool {
        matches!(self, NodeLabel::Value(_))
    }
}

impl Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NodeLabel::Untyped => Ok(()),
            NodeLabel::Type(t) => write!(f, "{}", t),
            NodeLabel::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Node data that determines the initial certificate of a node.
pub trait NodeData {
    /// The hash of the type label or embedded value of the node,
    /// or `None` for a node without either.
    fn label_hash(&self) -> Option<i32>;
}

impl NodeData for Empty {
    #[inline]
    fn label_hash(&self) -> Option<i32> {
        None
    }
}

impl NodeData for NodeLabel {
    fn label_hash(&self) -> Option<i32> {
        match self {
            NodeLabel::Untyped => None,
            // the variant discriminant is hashed along, so that a type `3` and a value `3` differ
            NodeLabel::Type(_) | NodeLabel::Value(_) => Some(label_hash(self)),
        }
    }
}

macro_rules! impl_node_data {
    ($($t:ty),*) => {
        $(
            impl NodeData for $t {
                #[inline]
                fn label_hash(&self) -> Option<i32> {
                    Some(label_hash(self))
                }
            }
        )*
    };
}

impl_node_data!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);
impl_node_data!(char, bool, String, str);

impl NodeData for SmartString<LazyCompact> {
    #[inline]
    fn label_hash(&self) -> Option<i32> {
        Some(label_hash(self.as_str()))
    }
}

impl<T: NodeData + ?Sized> NodeData for &T {
    #[inline]
    fn label_hash(&self) -> Option<i32> {
        (**self).label_hash()
    }
}

static LABEL_HASHER: Lazy<RandomState> = Lazy::new(|| {
    RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
});

/// Hash a label to a 32-bit value. The hasher uses fixed seeds, so the result
/// only depends on the label.
pub fn label_hash<T: Hash + ?Sized>(label: &T) -> i32 {
    let mut h = LABEL_HASHER.build_hasher();
    label.hash(&mut h);
    let x = h.finish();
    (x ^ (x >> 32)) as i32
}

/// A directed multigraph with support for arbitrary node and edge data.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Graph<NodeData = Empty, EdgeData = Empty> {
    nodes: Vec<Node<NodeData>>,
    edges: Vec<Edge<EdgeData>>,
}

impl<N, E> Default for Graph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Display, E: Display> std::fmt::Display for Graph<N, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (i, x) in self.nodes.iter().enumerate() {
            writeln!(f, "N{}: {}", i, x.data)?;
        }

        for x in &self.edges {
            writeln!(f, "{} {}->{}", x.data, x.source, x.target)?;
        }
        Ok(())
    }
}

impl<N: Display, E: Display> Graph<N, E> {
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph G {\n");

        for (i, x) in self.nodes.iter().enumerate() {
            out.push_str(&format!("  {} [label=\"{}\"];\n", i, x.data));
        }

        for x in &self.edges {
            out.push_str(&format!(
                "  {} -> {} [label=\"{}\"];\n",
                x.source, x.target, x.data
            ));
        }

        out.push_str("}\n");
        out
    }
}

impl<N, E> Graph<N, E> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Add a node to the graph, with arbitrary data, and return its index.
    pub fn add_node(&mut self, data: N) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            edges: Vec::new(),
            data,
        });
        index
    }

    /// Add an edge from vertex index `source` to `target` to the graph, with arbitrary data,
    /// and return its index.
    pub fn add_edge(&mut self, source: usize, target: usize, data: E) -> usize {
        assert!(
            source < self.nodes.len() && target < self.nodes.len(),
            "edge {}->{} refers to a node outside of the graph with {} nodes",
            source,
            target,
            self.nodes.len()
        );

        let index = self.edges.len();
        self.edges.push(Edge {
            source,
            target,
            data,
        });
        self.nodes[source].edges.push(index);
        if source != target {
            self.nodes[target].edges.push(index);
        }
        index
    }

    /// Get the node with index `index`.
    #[inline(always)]
    pub fn node(&self, index: usize) -> &Node<N> {
        &self.nodes[index]
    }

    /// Get the edge with index `index`.
    #[inline(always)]
    pub fn edge(&self, index: usize) -> &Edge<E> {
        &self.edges[index]
    }

    /// Get all nodes of the graph.
    #[inline(always)]
    pub fn nodes(&self) -> &[Node<N>] {
        &self.nodes
    }

    /// Get all edges of the graph.
    #[inline(always)]
    pub fn edges(&self) -> &[Edge<E>] {
        &self.edges
    }

    #[inline(always)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline(always)]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Iterate over the indices of the edges leaving `node`, including self-loops.
    pub fn outgoing(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[node]
            .edges
            .iter()
            .copied()
            .filter(move |e| self.edges[*e].source == node)
    }

    /// Iterate over the indices of the edges entering `node`, including self-loops.
    pub fn incoming(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[node]
            .edges
            .iter()
            .copied()
            .filter(move |e| self.edges[*e].target == node)
    }

    /// Returns `true` iff no edge is incident to `node`.
    #[inline]
    pub fn is_isolated(&self, node: usize) -> bool {
        self.nodes[node].edges.is_empty()
    }
}

impl<N: Clone, E: Clone> Graph<N, E> {
    /// Renumber the nodes of the graph: node `i` becomes node `perm[i]`.
    /// Edges keep their order and data.
    pub fn permute(&self, perm: &[usize]) -> Self {
        assert_eq!(
            perm.len(),
            self.nodes.len(),
            "permutation has the wrong length"
        );

        let mut order = vec![usize::MAX; perm.len()];
        for (i, &p) in perm.iter().enumerate() {
            assert!(
                p < perm.len() && order[p] == usize::MAX,
                "not a permutation"
            );
            order[p] = i;
        }

        let mut g = Graph::new();
        for &i in &order {
            g.add_node(self.nodes[i].data.clone());
        }
        for e in &self.edges {
            g.add_edge(perm[e.source], perm[e.target], e.data.clone());
        }
        g
    }
}

#[cfg(test)]
mod test {
    use crate::graph::{label_hash, DataValue, Empty, Graph, NodeData, NodeLabel};

    #[test]
    fn incidence() {
        let mut g = Graph::<Empty, &str>::new();
        let n0 = g.add_node(Empty);
        let n1 = g.add_node(Empty);
        g.add_edge(n0, n1, "a");
        g.add_edge(n1, n1, "b");
        g.add_edge(n1, n0, "c");

        assert_eq!(g.outgoing(n0).collect::<Vec<_>>(), vec![0]);
        assert_eq!(g.incoming(n0).collect::<Vec<_>>(), vec![2]);
        assert_eq!(g.outgoing(n1).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(g.incoming(n1).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(g.node(n1).edges.len(), 3); // the loop is listed once
        assert!(g.edge(1).is_loop());
    }

    #[test]
    #[should_panic]
    fn unknown_node() {
        let mut g = Graph::<Empty, Empty>::new();
        let n0 = g.add_node(Empty);
        g.add_edge(n0, 5, Empty);
    }

    #[test]
    fn permute() {
        let mut g = Graph::new();
        let n0 = g.add_node(0);
        let n1 = g.add_node(1);
        let n2 = g.add_node(2);
        g.add_edge(n0, n1, 'x');
        g.add_edge(n1, n2, 'y');

        let p = g.permute(&[2, 0, 1]);
        assert_eq!(p.node(2).data, 0);
        assert_eq!(p.node(0).data, 1);
        assert_eq!(p.edge(0).source, 2);
        assert_eq!(p.edge(0).target, 0);
        assert_eq!(p.edge(1).data, 'y');
        assert!(p.is_isolated(1) == g.is_isolated(2));
    }

    #[test]
    fn label_hashes() {
        assert_eq!(NodeLabel::Untyped.label_hash(), None);
        assert_eq!(Empty.label_hash(), None);
        assert_eq!(label_hash("abc"), label_hash("abc"));
        assert_ne!(
            NodeLabel::int(3).label_hash(),
            NodeLabel::int(5).label_hash()
        );
        assert_ne!(
            NodeLabel::typed("3").label_hash(),
            NodeLabel::Value(DataValue::Str("3".into())).label_hash()
        );
    }

    #[test]
    fn dot() {
        let mut g = Graph::new();
        let n0 = g.add_node(NodeLabel::typed("A"));
        let n1 = g.add_node(NodeLabel::int(7));
        g.add_edge(n0, n1, "val");

        assert_eq!(
            g.to_dot(),
            "digraph G {\n  0 [label=\"A\"];\n  1 [label=\"7\"];\n  0 -> 1 [label=\"val\"];\n}\n"
        );
    }
}
