//! Isomorphism checking between graphs.
//!
//! The checker decides isomorphism in stages of increasing cost: a direct
//! comparison for equal graphs, a comparison of graph certificates, a direct
//! construction when all certificates are unique, and finally a backtracking
//! search over the elements whose certificates are tied.
//!
//! Every isomorphism that is reported is verified on node data and edge data,
//! so colliding certificates never lead to a false positive.
//!
//! ```
//! use isocert::graph::{Empty, Graph};
//! use isocert::iso::IsoChecker;
//!
//! let mut g = Graph::new();
//! let a = g.add_node(Empty);
//! let b = g.add_node(Empty);
//! let c = g.add_node(Empty);
//! g.add_edge(a, b, "e");
//! g.add_edge(b, c, "e");
//! g.add_edge(c, a, "e");
//!
//! let h = g.permute(&[2, 0, 1]);
//!
//! let mut checker = IsoChecker::default();
//! assert!(checker.are_isomorphic(&g, &h));
//! assert_eq!(checker.isomorphisms(&g, &g).count(), 3);
//! ```
use std::{fmt::Display, hash::Hash};

use ahash::HashMap;
use smallvec::SmallVec;
use tracing::{debug, instrument};

use crate::{
    certificate::{CertificateSettings, CertificateStrategy, PartitionRefiner},
    graph::{Graph, NodeData},
    morphism::Morphism,
};

mod plan;
mod search;

pub use search::IsoCheckerState;

/// Settings for the isomorphism checker.
#[derive(Clone, Debug, Default)]
pub struct IsoCheckerSettings {
    /// The settings of the certificates of both graphs. In strong mode the
    /// checker falls back to a backtracking search and has no false negatives.
    pub certificate: CertificateSettings,
}

impl IsoCheckerSettings {
    /// Settings without symmetry breaking and without search. Graphs whose
    /// certificates are not unique are reported as non-isomorphic.
    pub fn weak() -> Self {
        IsoCheckerSettings {
            certificate: CertificateSettings::weak(),
        }
    }
}

/// Counters of how the checks of an [IsoChecker] were decided.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IsoStatistics {
    /// The number of isomorphism checks.
    pub checks: usize,
    /// Checks decided by a direct comparison of equal graphs.
    pub equal_graphs: usize,
    /// Checks rejected because the sizes or certificates differ.
    pub certificate_mismatches: usize,
    /// Checks decided positively from unique certificates.
    pub discrete_isomorphic: usize,
    /// Checks with unique certificates for which no isomorphism could be constructed.
    pub discrete_failures: usize,
    /// Checks decided positively by a search.
    pub search_isomorphic: usize,
    /// Checks for which the search found no isomorphism.
    pub search_failures: usize,
    /// Checks rejected in weak mode because the certificates were ambiguous.
    pub weak_rejections: usize,
}

impl IsoStatistics {
    /// The number of checks that found an isomorphism.
    pub fn isomorphic(&self) -> usize {
        self.equal_graphs + self.discrete_isomorphic + self.search_isomorphic
    }
}

impl Display for IsoStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "Isomorphism checks: {}", self.checks)?;
        writeln!(f, "  equal graphs:          {}", self.equal_graphs)?;
        writeln!(
            f,
            "  certificate mismatch:  {}",
            self.certificate_mismatches
        )?;
        writeln!(
            f,
            "  discrete:              {} isomorphic, {} failed",
            self.discrete_isomorphic, self.discrete_failures
        )?;
        writeln!(
            f,
            "  search:                {} isomorphic, {} failed",
            self.search_isomorphic, self.search_failures
        )?;
        write!(f, "  weak rejections:       {}", self.weak_rejections)
    }
}

/// A checker for graph isomorphism that keeps statistics of its decisions.
#[derive(Clone, Debug, Default)]
pub struct IsoChecker {
    settings: IsoCheckerSettings,
    statistics: IsoStatistics,
}

impl IsoChecker {
    pub fn new(settings: IsoCheckerSettings) -> Self {
        IsoChecker {
            settings,
            statistics: IsoStatistics::default(),
        }
    }

    pub fn settings(&self) -> &IsoCheckerSettings {
        &self.settings
    }

    /// Returns `true` iff the checker has no false negatives.
    pub fn is_strong(&self) -> bool {
        self.settings.certificate.strong
    }

    pub fn statistics(&self) -> &IsoStatistics {
        &self.statistics
    }

    pub fn reset_statistics(&mut self) {
        self.statistics = IsoStatistics::default();
    }

    /// Check if `dom` and `cod` are isomorphic.
    ///
    /// A positive answer is always correct. A negative answer is only
    /// guaranteed to be correct in strong mode.
    pub fn are_isomorphic<N, E>(&mut self, dom: &Graph<N, E>, cod: &Graph<N, E>) -> bool
    where
        N: NodeData + PartialEq,
        E: Hash + Eq,
    {
        self.get_isomorphism(dom, cod).is_some()
    }

    /// Get an isomorphism from `dom` to `cod`, if one is found.
    #[instrument(level = "trace", skip_all)]
    pub fn get_isomorphism<N, E>(
        &mut self,
        dom: &Graph<N, E>,
        cod: &Graph<N, E>,
    ) -> Option<Morphism>
    where
        N: NodeData + PartialEq,
        E: Hash + Eq,
    {
        self.statistics.checks += 1;

        if dom.node_count() != cod.node_count() || dom.edge_count() != cod.edge_count() {
            self.statistics.certificate_mismatches += 1;
            return None;
        }

        if let Some(m) = equal_graphs(dom, cod) {
            self.statistics.equal_graphs += 1;
            return Some(m);
        }

        let d = PartitionRefiner::with_settings(dom, self.settings.certificate.clone());
        let c = d.new_instance(cod, self.is_strong());
        self.decide(&d, &c)
    }

    /// Check if the graphs of two certificate strategies are isomorphic,
    /// reusing the certificates that the strategies have computed already.
    pub fn are_isomorphic_certified<'a, N, E, S>(&mut self, dom: &S, cod: &S) -> bool
    where
        N: PartialEq + 'a,
        E: PartialEq + 'a,
        S: CertificateStrategy<'a, N, E>,
    {
        self.get_isomorphism_certified(dom, cod).is_some()
    }

    /// Get an isomorphism between the graphs of two certificate strategies.
    /// The graphs are not compared directly.
    pub fn get_isomorphism_certified<'a, N, E, S>(
        &mut self,
        dom: &S,
        cod: &S,
    ) -> Option<Morphism>
    where
        N: PartialEq + 'a,
        E: PartialEq + 'a,
        S: CertificateStrategy<'a, N, E>,
    {
        self.statistics.checks += 1;
        self.decide(dom, cod)
    }

    /// Enumerate all isomorphisms from `dom` to `cod`. Every isomorphism is
    /// generated exactly once, so for `dom == cod` this enumerates the automorphisms.
    ///
    /// In weak mode, the enumeration is empty unless all certificates are unique.
    pub fn isomorphisms<'a, N, E>(
        &mut self,
        dom: &'a Graph<N, E>,
        cod: &'a Graph<N, E>,
    ) -> IsoCheckerState<'a, N, E>
    where
        N: NodeData + PartialEq,
        E: Hash + Eq,
    {
        self.statistics.checks += 1;

        let d = PartitionRefiner::with_settings(dom, self.settings.certificate.clone());
        let c = d.new_instance(cod, self.is_strong());

        if dom.node_count() != cod.node_count()
            || dom.edge_count() != cod.edge_count()
            || d.graph_certificate() != c.graph_certificate()
        {
            self.statistics.certificate_mismatches += 1;
            return IsoCheckerState::exhausted(dom, cod);
        }

        let discrete =
            d.node_partition_map().is_one_to_one() && d.edge_partition_map().is_one_to_one();
        if !self.is_strong() && !discrete {
            self.statistics.weak_rejections += 1;
            return IsoCheckerState::exhausted(dom, cod);
        }

        match plan::build(&d, &c) {
            Some((plan, matching)) => IsoCheckerState::new(plan, matching),
            None => {
                self.statistics.search_failures += 1;
                IsoCheckerState::exhausted(dom, cod)
            }
        }
    }

    fn decide<'a, N, E, S>(&mut self, dom: &S, cod: &S) -> Option<Morphism>
    where
        N: PartialEq + 'a,
        E: PartialEq + 'a,
        S: CertificateStrategy<'a, N, E>,
    {
        let (dg, cg) = (dom.graph(), cod.graph());
        if dg.node_count() != cg.node_count()
            || dg.edge_count() != cg.edge_count()
            || dom.graph_certificate() != cod.graph_certificate()
        {
            self.statistics.certificate_mismatches += 1;
            return None;
        }

        let cod_discrete =
            cod.node_partition_map().is_one_to_one() && cod.edge_partition_map().is_one_to_one();
        if cod_discrete {
            let dom_discrete = dom.node_partition_map().is_one_to_one()
                && dom.edge_partition_map().is_one_to_one();
            if !dom_discrete {
                self.statistics.certificate_mismatches += 1;
                return None;
            }

            return match direct_morphism(dom, cod) {
                Some(m) => {
                    self.statistics.discrete_isomorphic += 1;
                    Some(m)
                }
                None => {
                    debug!("Unique certificates but no isomorphism: certificates collided");
                    self.statistics.discrete_failures += 1;
                    None
                }
            };
        }

        if dom.node_partition_count() != cod.node_partition_count() {
            self.statistics.certificate_mismatches += 1;
            return None;
        }

        if !dom.is_strong() || !cod.is_strong() {
            self.statistics.weak_rejections += 1;
            return None;
        }

        let found = plan::build(dom, cod).and_then(|(plan, matching)| {
            IsoCheckerState::new(plan, matching).next_isomorphism()
        });

        let outcome = if found.is_some() {
            "isomorphic"
        } else {
            "no isomorphism"
        };
        debug!(
            "Search with {} node classes: {}",
            dom.node_partition_count(),
            outcome
        );

        match found {
            Some(m) => {
                self.statistics.search_isomorphic += 1;
                Some(m)
            }
            None => {
                self.statistics.search_failures += 1;
                None
            }
        }
    }
}

/// Get the identity-on-nodes morphism if the graphs have equal node data at
/// every index and the same edges up to their order.
fn equal_graphs<N: PartialEq, E: Hash + Eq>(
    dom: &Graph<N, E>,
    cod: &Graph<N, E>,
) -> Option<Morphism> {
    if dom.node_count() != cod.node_count()
        || dom.edge_count() != cod.edge_count()
        || dom
            .nodes()
            .iter()
            .zip(cod.nodes())
            .any(|(a, b)| a.data != b.data)
    {
        return None;
    }

    let mut index: HashMap<(usize, usize, &E), SmallVec<[usize; 1]>> = HashMap::default();
    for (i, e) in cod.edges().iter().enumerate() {
        index
            .entry((e.source, e.target, &e.data))
            .or_default()
            .push(i);
    }

    let mut edges = Vec::with_capacity(dom.edge_count());
    for e in dom.edges() {
        edges.push(index.get_mut(&(e.source, e.target, &e.data))?.pop()?);
    }

    Some(Morphism::new((0..dom.node_count()).collect(), edges))
}

/// Construct the isomorphism implied by unique certificates on both sides.
fn direct_morphism<'a, N, E, S>(dom: &S, cod: &S) -> Option<Morphism>
where
    N: PartialEq + 'a,
    E: PartialEq + 'a,
    S: CertificateStrategy<'a, N, E>,
{
    const NONE: usize = usize::MAX;

    let (dg, cg) = (dom.graph(), cod.graph());
    let mut nodes = vec![NONE; dg.node_count()];
    let mut used = vec![false; cg.node_count()];
    let mut edges = vec![NONE; dg.edge_count()];

    let cod_edges = cod.edge_partition_map();
    for c in dom.edge_certificates() {
        let &[image] = cod_edges.get(c.value) else {
            return None;
        };

        let (de, ce) = (dg.edge(c.edge), cg.edge(image));
        if de.is_loop() != ce.is_loop() || de.data != ce.data {
            return None;
        }

        for (d, i) in [(de.source, ce.source), (de.target, ce.target)] {
            if nodes[d] == NONE {
                if used[i] || dg.node(d).data != cg.node(i).data {
                    return None;
                }
                nodes[d] = i;
                used[i] = true;
            } else if nodes[d] != i {
                return None;
            }
        }

        edges[c.edge] = image;
    }

    let cod_nodes = cod.node_partition_map();
    for c in dom.node_certificates() {
        if nodes[c.node] != NONE {
            continue;
        }

        let &[image] = cod_nodes.get(c.value) else {
            return None;
        };
        if used[image] || !cg.is_isolated(image) || dg.node(c.node).data != cg.node(image).data
        {
            return None;
        }
        nodes[c.node] = image;
        used[image] = true;
    }

    Some(Morphism::new(nodes, edges))
}

#[cfg(test)]
mod test {
    use crate::{
        certificate::{CertificateSettings, CertificateStrategy, PartitionRefiner},
        graph::{Empty, Graph, NodeData, NodeLabel},
    };

    use super::{IsoChecker, IsoCheckerSettings};

    /// Node data whose certificate ignores the payload.
    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Opaque(u8);

    impl NodeData for Opaque {
        fn label_hash(&self) -> Option<i32> {
            Some(7)
        }
    }

    fn cycle(n: usize) -> Graph<Empty, &'static str> {
        let mut g = Graph::new();
        for _ in 0..n {
            g.add_node(Empty);
        }
        for i in 0..n {
            g.add_edge(i, (i + 1) % n, "e");
        }
        g
    }

    fn triangle(reversed: bool) -> Graph<Empty, &'static str> {
        let mut g = Graph::new();
        let n: Vec<_> = (0..3).map(|_| g.add_node(Empty)).collect();
        g.add_edge(n[0], n[1], "e");
        g.add_edge(n[1], n[2], "e");
        if reversed {
            g.add_edge(n[0], n[2], "e");
        } else {
            g.add_edge(n[2], n[0], "e");
        }
        g
    }

    #[test]
    fn equal() {
        let g = triangle(false);
        let mut h = Graph::new();
        for _ in 0..3 {
            h.add_node(Empty);
        }
        // same edges, different order
        h.add_edge(2, 0, "e");
        h.add_edge(0, 1, "e");
        h.add_edge(1, 2, "e");

        let mut checker = IsoChecker::default();
        let m = checker.get_isomorphism(&g, &h).unwrap();
        assert!(m.is_isomorphism(&g, &h));
        assert_eq!(m.node_map(), &[0, 1, 2]);
        assert_eq!(checker.statistics().equal_graphs, 1);
    }

    #[test]
    fn triangles() {
        let g = triangle(false);
        let mut checker = IsoChecker::default();

        let h = g.permute(&[1, 2, 0]);
        let m = checker.get_isomorphism(&g, &h).unwrap();
        assert!(m.is_isomorphism(&g, &h));

        assert!(!checker.are_isomorphic(&g, &triangle(true)));
        assert_eq!(checker.statistics().checks, 2);
        assert_eq!(checker.statistics().isomorphic(), 1);

        checker.reset_statistics();
        assert_eq!(checker.statistics().checks, 0);
    }

    #[test]
    fn discrete() {
        let mut g: Graph<NodeLabel, &str> = Graph::new();
        let a = g.add_node(NodeLabel::typed("A"));
        let b = g.add_node(NodeLabel::typed("B"));
        let c = g.add_node(NodeLabel::int(3));
        g.add_node(NodeLabel::typed("D"));
        g.add_edge(a, b, "x");
        g.add_edge(b, c, "val");
        g.add_edge(a, a, "flag");

        let h = g.permute(&[3, 1, 0, 2]);

        let mut checker = IsoChecker::default();
        let m = checker.get_isomorphism(&g, &h).unwrap();
        assert!(m.is_isomorphism(&g, &h));
        assert_eq!(m.node_map(), &[3, 1, 0, 2]);
        assert_eq!(checker.statistics().discrete_isomorphic, 1);
    }

    #[test]
    fn weak() {
        // two symmetric nodes pointing to a shared target
        let mut g: Graph<Empty, Empty> = Graph::new();
        let a = g.add_node(Empty);
        let b = g.add_node(Empty);
        let c = g.add_node(Empty);
        g.add_edge(a, c, Empty);
        g.add_edge(b, c, Empty);
        let h = g.permute(&[1, 2, 0]);

        let mut weak = IsoChecker::new(IsoCheckerSettings::weak());
        assert!(!weak.is_strong());
        assert!(weak.are_isomorphic(&g, &g));
        assert!(!weak.are_isomorphic(&g, &h));
        assert_eq!(weak.statistics().weak_rejections, 1);
        assert_eq!(weak.isomorphisms(&g, &h).count(), 0);

        let mut strong = IsoChecker::default();
        assert!(strong.are_isomorphic(&g, &h));
        assert_eq!(strong.statistics().search_isomorphic, 1);
        assert_eq!(strong.isomorphisms(&g, &h).count(), 2);
    }

    #[test]
    fn certified() {
        let g = triangle(false);
        let h = g.permute(&[2, 0, 1]);
        let r = triangle(true);

        let dg = PartitionRefiner::new(&g);
        let dh = dg.new_instance(&h, true);
        let dr = dg.new_instance(&r, true);

        let mut checker = IsoChecker::default();
        assert!(checker.are_isomorphic_certified(&dg, &dh));
        assert!(!checker.are_isomorphic_certified(&dg, &dr));
        assert!(dg.is_computed());
        assert_eq!(checker.statistics().checks, 2);
        assert_eq!(checker.statistics().equal_graphs, 0);
    }

    #[test]
    fn statistics_display() {
        let mut checker = IsoChecker::default();
        let g = triangle(false);
        checker.are_isomorphic(&g, &g);
        let s = checker.statistics().to_string();
        assert!(s.starts_with("Isomorphism checks: 1"));
        assert!(s.contains("equal graphs:          1"));
    }

    #[test]
    fn colliding_certificates() {
        let graph = |target| {
            let mut g = Graph::new();
            let a = g.add_node(Opaque(1));
            let b = g.add_node(Opaque(target));
            g.add_edge(a, b, "e");
            g
        };
        let (g, h) = (graph(2), graph(3));

        let mut checker = IsoChecker::default();
        assert!(!checker.are_isomorphic(&g, &h));
        assert_eq!(checker.statistics().discrete_failures, 1);
        assert_eq!(checker.statistics().certificate_mismatches, 0);
    }

    #[test]
    fn inconsistent_forced_binding() {
        // the `f` edge has a unique certificate, the two `e` edges are tied
        let graph = |target| {
            let mut g = Graph::new();
            let a = g.add_node(Opaque(1));
            let b = g.add_node(Opaque(target));
            g.add_edge(a, b, "f");
            let r = g.add_node(Opaque(0));
            for _ in 0..2 {
                let p = g.add_node(Opaque(0));
                g.add_edge(p, r, "e");
            }
            g
        };
        let (g, h) = (graph(2), graph(3));

        let mut checker = IsoChecker::default();
        assert!(!checker.are_isomorphic(&g, &h));
        assert_eq!(checker.statistics().search_failures, 1);
        assert_eq!(checker.statistics().certificate_mismatches, 0);
    }

    #[test]
    fn search_beyond_symmetry_budget() {
        let settings = IsoCheckerSettings {
            certificate: CertificateSettings {
                max_symmetry_candidates: 2,
                ..Default::default()
            },
        };
        let mut checker = IsoChecker::new(settings);
        assert!(checker.is_strong());

        let six = cycle(6);
        let shuffled = six.permute(&[0, 2, 4, 1, 3, 5]);
        let m = checker.get_isomorphism(&six, &shuffled).unwrap();
        assert!(m.is_isomorphism(&six, &shuffled));
        assert_eq!(checker.statistics().search_isomorphic, 1);

        // without symmetry breaking, one 6-cycle and two 3-cycles share certificates
        let mut two = cycle(3);
        for _ in 0..3 {
            two.add_node(Empty);
        }
        for i in 3..6 {
            two.add_edge(i, 3 + (i - 2) % 3, "e");
        }
        assert!(!checker.are_isomorphic(&six, &two));
        assert_eq!(checker.statistics().search_failures, 1);
        assert_eq!(checker.statistics().certificate_mismatches, 0);

        assert_eq!(checker.isomorphisms(&six, &six).count(), 6);
    }
}
