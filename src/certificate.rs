//! Certificates of graph elements.
//!
//! A certificate is an integer attached to every node and edge of a graph that is
//! invariant under isomorphism once refinement has reached its fixpoint. Elements
//! with different certificates can never be mapped onto each other, which makes
//! certificates a fast filter before an explicit isomorphism search.
//!
//! ```
//! use isocert::certificate::{CertificateStrategy, PartitionRefiner};
//! use isocert::graph::{Empty, Graph};
//!
//! let mut g = Graph::new();
//! let a = g.add_node(Empty);
//! let b = g.add_node(Empty);
//! let c = g.add_node(Empty);
//! g.add_edge(a, c, "next");
//! g.add_edge(b, c, "next");
//!
//! let refiner = PartitionRefiner::new(&g);
//! // `a` and `b` are symmetric and can never be told apart
//! assert_eq!(refiner.node_partition_count(), 2);
//! ```
use ahash::HashMap;
use byteorder::{LittleEndian, WriteBytesExt};
use bytes::Buf;
use std::{
    fmt::Display,
    io::{Read, Write},
};

use crate::{graph::Graph, partition::PartitionMap};

mod block;
mod refiner;

pub use refiner::PartitionRefiner;

/// A node or an edge of a graph, by index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Element {
    Node(usize),
    Edge(usize),
}

/// The certificate of a single graph element.
pub trait ElementCertificate {
    /// The index type of the certified element.
    type Element: Copy;

    /// The certificate value. Only meaningful after the fixpoint is reached.
    fn value(&self) -> i32;

    /// The element that is certified.
    fn element(&self) -> Self::Element;
}

/// The certificate of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeCertificate {
    pub node: usize,
    pub value: i32,
}

impl ElementCertificate for NodeCertificate {
    type Element = usize;

    #[inline]
    fn value(&self) -> i32 {
        self.value
    }

    #[inline]
    fn element(&self) -> usize {
        self.node
    }
}

/// The certificate of an edge. A self-loop is certified as a unary edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeCertificate {
    pub edge: usize,
    pub value: i32,
    pub unary: bool,
}

impl ElementCertificate for EdgeCertificate {
    type Element = usize;

    #[inline]
    fn value(&self) -> i32 {
        self.value
    }

    #[inline]
    fn element(&self) -> usize {
        self.edge
    }
}

/// The certificate of any element of a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Certificate {
    Node(NodeCertificate),
    Edge(EdgeCertificate),
}

impl Certificate {
    /// Returns `true` iff the certificate belongs to a self-loop.
    pub fn is_unary(&self) -> bool {
        matches!(self, Certificate::Edge(e) if e.unary)
    }
}

impl ElementCertificate for Certificate {
    type Element = Element;

    #[inline]
    fn value(&self) -> i32 {
        match self {
            Certificate::Node(n) => n.value,
            Certificate::Edge(e) => e.value,
        }
    }

    #[inline]
    fn element(&self) -> Element {
        match self {
            Certificate::Node(n) => Element::Node(n.node),
            Certificate::Edge(e) => Element::Edge(e.edge),
        }
    }
}

/// A certificate for an entire graph. Isomorphic graphs have equal certificates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GraphCertificate {
    pub value: i32,
    pub nodes: u32,
    pub edges: u32,
    pub partitions: u32,
}

const CERTIFICATE_TAG: &[u8; 4] = b"GCRT";
const CERTIFICATE_SIZE: usize = 20;

impl GraphCertificate {
    /// Write the certificate to a binary stream, in little-endian order.
    pub fn write<W: Write>(&self, mut dest: W) -> Result<(), std::io::Error> {
        dest.write_all(CERTIFICATE_TAG)?;
        dest.write_i32::<LittleEndian>(self.value)?;
        dest.write_u32::<LittleEndian>(self.nodes)?;
        dest.write_u32::<LittleEndian>(self.edges)?;
        dest.write_u32::<LittleEndian>(self.partitions)
    }

    /// Read a certificate written by [Self::write].
    pub fn read<R: Read>(mut source: R) -> Result<GraphCertificate, std::io::Error> {
        let mut buf = [0; CERTIFICATE_SIZE];
        source.read_exact(&mut buf)?;
        Self::from_bytes(&buf).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "not a graph certificate")
        })
    }

    /// Parse a certificate from the start of `data`.
    pub fn from_bytes(mut data: &[u8]) -> Option<GraphCertificate> {
        if data.len() < CERTIFICATE_SIZE || &data[..4] != CERTIFICATE_TAG {
            return None;
        }

        data.advance(4);
        Some(GraphCertificate {
            value: data.get_i32_le(),
            nodes: data.get_u32_le(),
            edges: data.get_u32_le(),
            partitions: data.get_u32_le(),
        })
    }
}

impl Display for GraphCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{:08x} ({} nodes, {} edges, {} partitions)",
            self.value, self.nodes, self.edges, self.partitions
        )
    }
}

/// Settings for the certificate computation.
#[derive(Clone, Debug)]
pub struct CertificateSettings {
    /// Try to break symmetries when refinement stalls, so that certificates
    /// distinguish as much as possible. Isomorphism checking with strong
    /// certificates has no false negatives.
    pub strong: bool,
    /// Stop refining as soon as every node has a unique certificate.
    /// Saves one round at the cost of coarser edge certificates.
    pub stop_when_discrete: bool,
    /// The maximal number of symmetry-breaking rounds.
    pub max_symmetry_rounds: usize,
    /// The maximal size of a class of tied nodes for which symmetry breaking is tried.
    pub max_symmetry_candidates: usize,
}

impl Default for CertificateSettings {
    fn default() -> Self {
        CertificateSettings {
            strong: true,
            stop_when_discrete: true,
            max_symmetry_rounds: 4,
            max_symmetry_candidates: 32,
        }
    }
}

impl CertificateSettings {
    /// Settings for plain refinement, without symmetry breaking.
    pub fn weak() -> Self {
        CertificateSettings {
            strong: false,
            ..Default::default()
        }
    }
}

/// A strategy to compute certificates for the elements of a single graph.
///
/// A strategy is bound to one graph and computes its certificates lazily, on the first
/// call of any of the certificate getters. The results are memoized.
pub trait CertificateStrategy<'a, N: 'a, E: 'a> {
    /// Create a strategy of the same kind for another graph.
    fn new_instance(&self, graph: &'a Graph<N, E>, strong: bool) -> Self
    where
        Self: Sized;

    /// The graph that is certified.
    fn graph(&self) -> &'a Graph<N, E>;

    /// Returns `true` iff the certificates are computed with symmetry breaking,
    /// so that no isomorphism is missed.
    fn is_strong(&self) -> bool;

    /// The certificate of the whole graph.
    fn graph_certificate(&self) -> GraphCertificate;

    /// The node certificates, ordered by node index.
    fn node_certificates(&self) -> &[NodeCertificate];

    /// The edge certificates. All binary edges come first, followed by
    /// all self-loops.
    fn edge_certificates(&self) -> &[EdgeCertificate];

    /// The number of binary edges, i.e., the number of leading binary
    /// certificates in [Self::edge_certificates].
    fn binary_edge_count(&self) -> usize;

    /// The map from certificate values to nodes.
    fn node_partition_map(&self) -> &PartitionMap<usize>;

    /// The map from certificate values to edges.
    fn edge_partition_map(&self) -> &PartitionMap<usize>;

    /// The number of node classes.
    fn node_partition_count(&self) -> usize;

    /// The certificate of every element.
    fn certificate_map(&self) -> HashMap<Element, Certificate> {
        let nodes = self
            .node_certificates()
            .iter()
            .map(|c| Certificate::Node(*c));
        let edges = self
            .edge_certificates()
            .iter()
            .map(|c| Certificate::Edge(*c));
        nodes.chain(edges).map(|c| (c.element(), c)).collect()
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::GraphCertificate;

    #[test]
    fn export() {
        let c = GraphCertificate {
            value: -123456,
            nodes: 4,
            edges: 7,
            partitions: 3,
        };

        let mut buf = vec![];
        c.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 20);
        assert_eq!(&buf[..4], b"GCRT");

        let r = GraphCertificate::read(Cursor::new(&buf)).unwrap();
        assert_eq!(r, c);

        buf[0] = b'X';
        let err = GraphCertificate::read(Cursor::new(&buf)).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        assert_eq!(GraphCertificate::from_bytes(&buf[4..]), None);
    }
}
