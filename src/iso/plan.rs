use std::{cmp::Reverse, collections::BinaryHeap};

use smallvec::SmallVec;
use tracing::debug;

use crate::certificate::CertificateStrategy;

use super::search::{Decision, Matching};

/// The priority of an ambiguous edge: more pinned endpoints first,
/// then fewer candidates, then the lower edge index.
type Priority = (u8, Reverse<usize>, Reverse<usize>);

type Candidates = Option<SmallVec<[usize; 4]>>;

/// Build a search plan for the isomorphisms from the graph of `dom` to the graph of `cod`.
///
/// Edges with a unique candidate are bound immediately. The returned matching
/// holds those forced bindings. Returns `None` if the certificates rule out
/// any isomorphism.
pub(crate) fn build<'a, N, E, S>(
    dom: &S,
    cod: &S,
) -> Option<(Vec<Decision>, Matching<'a, N, E>)>
where
    N: PartialEq + 'a,
    E: PartialEq + 'a,
    S: CertificateStrategy<'a, N, E>,
{
    let (dg, cg) = (dom.graph(), cod.graph());
    if dg.node_count() != cg.node_count() || dg.edge_count() != cg.edge_count() {
        return None;
    }

    let cod_nodes = cod.node_partition_map();
    let cod_edges = cod.edge_partition_map();
    if !dom.node_partition_map().same_shape(cod_nodes)
        || !dom.edge_partition_map().same_shape(cod_edges)
    {
        return None;
    }

    let mut matching = Matching::new(
        dg,
        cg,
        dom.node_certificates().iter().map(|c| c.value).collect(),
        cod.node_certificates().iter().map(|c| c.value).collect(),
    );

    // bind the edges that have a single candidate
    let mut forced: SmallVec<[usize; 2]> = SmallVec::new();
    let mut candidates: Vec<Candidates> = vec![None; dg.edge_count()];
    for c in dom.edge_certificates() {
        match cod_edges.get(c.value) {
            [] => return None,
            [image] => {
                if !matching.bind_edge(c.edge, *image, &mut forced) {
                    debug!(
                        "Forced binding of edge {} to {} is inconsistent",
                        c.edge, image
                    );
                    return None;
                }
            }
            images => candidates[c.edge] = Some(images.into()),
        }
    }

    let mut pinned: Vec<bool> = (0..dg.node_count())
        .map(|n| matching.image(n).is_some())
        .collect();

    let priority = |edge: usize, pinned: &[bool], candidates: &[Candidates]| {
        let e = dg.edge(edge);
        let count = candidates[edge].as_ref().map_or(0, |c| c.len());
        (
            pinned[e.source] as u8 + pinned[e.target] as u8,
            Reverse(count),
            Reverse(edge),
        )
    };

    // order the ambiguous edges component by component, expanding
    // the frontier from the endpoints of every planned edge
    let mut seeds: BinaryHeap<Priority> = (0..dg.edge_count())
        .filter(|e| candidates[*e].is_some())
        .map(|e| priority(e, &pinned, &candidates))
        .collect();
    let mut frontier: BinaryHeap<Priority> = BinaryHeap::new();

    let mut plan = vec![];
    while let Some((pre, _, Reverse(edge))) = frontier.pop().or_else(|| seeds.pop()) {
        if candidates[edge].is_none() || pre != priority(edge, &pinned, &candidates).0 {
            continue;
        }

        if let Some(c) = candidates[edge].take() {
            plan.push(Decision::Edge {
                edge,
                candidates: c,
            });
        }

        let e = dg.edge(edge);
        for n in [e.source, e.target] {
            if pinned[n] {
                continue;
            }

            pinned[n] = true;
            for f in &dg.node(n).edges {
                if candidates[*f].is_some() {
                    frontier.push(priority(*f, &pinned, &candidates));
                }
            }
        }
    }

    // isolated nodes are matched last, singletons first
    let mut node_decisions = vec![];
    for c in dom.node_certificates() {
        if !dg.is_isolated(c.node) {
            continue;
        }

        let images: SmallVec<[usize; 4]> = cod_nodes
            .get(c.value)
            .iter()
            .copied()
            .filter(|n| cg.is_isolated(*n))
            .collect();

        match images.len() {
            0 => return None,
            1 => {
                if !matching.bind_node(c.node, images[0], &mut forced) {
                    return None;
                }
            }
            _ => node_decisions.push((c.node, images)),
        }
    }

    node_decisions.sort_by_key(|(n, c)| (c.len(), *n));
    plan.extend(
        node_decisions
            .into_iter()
            .map(|(node, candidates)| Decision::Node { node, candidates }),
    );

    Some((plan, matching))
}

#[cfg(test)]
mod test {
    use crate::{
        certificate::{CertificateSettings, CertificateStrategy, PartitionRefiner},
        graph::{Empty, Graph, NodeData},
        iso::search::Decision,
    };

    use super::build;

    #[derive(Clone, Debug, PartialEq)]
    struct Opaque(u8);

    impl NodeData for Opaque {
        fn label_hash(&self) -> Option<i32> {
            Some(7)
        }
    }

    #[test]
    fn forced() {
        let mut g: Graph<Empty, &str> = Graph::new();
        let a = g.add_node(Empty);
        let b = g.add_node(Empty);
        let c = g.add_node(Empty);
        g.add_edge(a, b, "x");
        g.add_edge(b, c, "y");

        let d = PartitionRefiner::new(&g);
        let (plan, m) = build(&d, &d).unwrap();
        assert!(plan.is_empty());
        assert_eq!(m.image(0), Some(0));
        assert_eq!(m.image(2), Some(2));
    }

    #[test]
    fn frontier() {
        // a star: the center is forced, every arm is ambiguous and already pinned at one end
        let mut g: Graph<Empty, Empty> = Graph::new();
        let center = g.add_node(Empty);
        for _ in 0..3 {
            let n = g.add_node(Empty);
            g.add_edge(center, n, Empty);
        }

        let d = PartitionRefiner::with_settings(&g, CertificateSettings::weak());
        let (plan, m) = build(&d, &d).unwrap();
        assert_eq!(m.image(center), None);
        assert_eq!(plan.len(), 3);
        for p in &plan {
            match p {
                Decision::Edge { candidates, .. } => assert_eq!(candidates.len(), 3),
                Decision::Node { .. } => panic!("unexpected node decision"),
            }
        }
    }

    #[test]
    fn isolated() {
        let mut g: Graph<char, Empty> = Graph::new();
        g.add_node('a');
        g.add_node('a');
        g.add_node('b');

        let d = PartitionRefiner::new(&g);
        let (plan, m) = build(&d, &d).unwrap();
        assert_eq!(m.image(2), Some(2));
        assert_eq!(plan.len(), 2);
        assert!(matches!(plan[0], Decision::Node { .. }));
    }

    #[test]
    fn inconsistent_forced_edge() {
        let graph = |target| {
            let mut g: Graph<Opaque, &str> = Graph::new();
            let a = g.add_node(Opaque(1));
            let b = g.add_node(Opaque(target));
            g.add_edge(a, b, "f");
            g
        };
        let (g, h) = (graph(2), graph(3));

        let d = PartitionRefiner::new(&g);
        let c = d.new_instance(&h, true);
        assert_eq!(d.graph_certificate(), c.graph_certificate());
        assert!(build(&d, &c).is_none());
        assert!(build(&d, &d).is_some());
    }
}
