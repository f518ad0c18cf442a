//! Isocert is a library for certifying labelled directed graphs and checking them for isomorphism.
//!
//! Every node and edge of a graph gets a certificate: an integer that is invariant under
//! isomorphism. Certificates are computed by partition refinement, optionally combined with
//! symmetry breaking. Graphs with different certificates are never isomorphic, which makes
//! most checks between distinct graphs very cheap. When certificates leave some elements
//! tied, an explicit, resumable backtracking search decides.
//!
//! For example:
//!
//! ```
//! use isocert::graph::{Graph, NodeLabel};
//! use isocert::iso::IsoChecker;
//!
//! let mut g = Graph::new();
//! let a = g.add_node(NodeLabel::typed("Cell"));
//! let b = g.add_node(NodeLabel::typed("Cell"));
//! let v = g.add_node(NodeLabel::int(3));
//! g.add_edge(a, b, "next");
//! g.add_edge(b, v, "val");
//!
//! let h = g.permute(&[2, 0, 1]);
//!
//! let mut checker = IsoChecker::default();
//! let m = checker.get_isomorphism(&g, &h).unwrap();
//! assert!(m.is_isomorphism(&g, &h));
//! println!("{}", checker.statistics());
//! ```

pub mod certificate;
pub mod graph;
pub mod iso;
pub mod morphism;
pub mod partition;

pub use certificate::{
    Certificate, CertificateSettings, CertificateStrategy, GraphCertificate, PartitionRefiner,
};
pub use graph::Graph;
pub use iso::{IsoChecker, IsoCheckerSettings, IsoCheckerState, IsoStatistics};
pub use morphism::Morphism;
