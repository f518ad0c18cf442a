use std::io::Cursor;

use isocert::{
    certificate::{CertificateSettings, CertificateStrategy, GraphCertificate, PartitionRefiner},
    graph::{Empty, Graph, NodeLabel},
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

fn random_graph(rng: &mut StdRng, nodes: usize, edges: usize) -> Graph<NodeLabel, u8> {
    let mut g = Graph::new();
    for _ in 0..nodes {
        let label = match rng.gen_range(0..4) {
            0 => NodeLabel::Untyped,
            1 => NodeLabel::typed("Cell"),
            2 => NodeLabel::int(rng.gen_range(0..3)),
            _ => NodeLabel::bool(rng.gen()),
        };
        g.add_node(label);
    }
    for _ in 0..edges {
        let s = rng.gen_range(0..nodes);
        let t = rng.gen_range(0..nodes);
        g.add_edge(s, t, rng.gen_range(0..3));
    }
    g
}

fn sorted_node_values<'a, S: CertificateStrategy<'a, NodeLabel, u8>>(r: &S) -> Vec<i32> {
    let mut v: Vec<_> = r.node_certificates().iter().map(|c| c.value).collect();
    v.sort_unstable();
    v
}

#[test]
fn invariance() {
    let mut rng = StdRng::seed_from_u64(1);

    for settings in [CertificateSettings::default(), CertificateSettings::weak()] {
        for _ in 0..100 {
            let nodes = rng.gen_range(1..10);
            let edges = rng.gen_range(0..3 * nodes);
            let g = random_graph(&mut rng, nodes, edges);

            let mut perm: Vec<usize> = (0..nodes).collect();
            perm.shuffle(&mut rng);
            let h = g.permute(&perm);

            let rg = PartitionRefiner::with_settings(&g, settings.clone());
            let rh = rg.new_instance(&h, settings.strong);

            assert_eq!(rg.graph_certificate(), rh.graph_certificate());
            assert_eq!(sorted_node_values(&rg), sorted_node_values(&rh));
            assert_eq!(rg.node_partition_count(), rh.node_partition_count());
            for (i, &p) in perm.iter().enumerate() {
                assert_eq!(
                    rg.node_certificates()[i].value,
                    rh.node_certificates()[p].value
                );
            }
        }
    }
}

#[test]
fn monotone_history() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..50 {
        let g = random_graph(&mut rng, 12, 15);
        let r = PartitionRefiner::with_settings(&g, CertificateSettings::weak());
        let h = r.partition_history();
        assert!(h.len() >= 2);
        assert!(h.windows(2).all(|w| w[0] <= w[1]));
        assert!(*h.last().unwrap() <= g.node_count());
    }
}

#[test]
fn full_fixpoint() {
    // a path with a distinguished end becomes discrete early
    let mut g = Graph::<NodeLabel, u8>::new();
    g.add_node(NodeLabel::typed("Head"));
    for i in 1..6 {
        g.add_node(NodeLabel::Untyped);
        g.add_edge(i - 1, i, 0);
    }

    let early = PartitionRefiner::new(&g);
    let full = PartitionRefiner::with_settings(
        &g,
        CertificateSettings {
            stop_when_discrete: false,
            ..Default::default()
        },
    );

    assert_eq!(early.node_partition_count(), 6);
    assert_eq!(full.node_partition_count(), 6);
    let (full, early) = (full.partition_history(), early.partition_history());
    assert!(full.len() >= early.len());
}

#[test]
fn export() {
    let mut g = Graph::<Empty, &str>::new();
    for _ in 0..4 {
        g.add_node(Empty);
    }
    g.add_edge(0, 1, "a");
    g.add_edge(1, 2, "b");
    g.add_edge(2, 3, "a");
    g.add_edge(3, 3, "loop");

    let c = PartitionRefiner::new(&g).graph_certificate();
    assert_eq!(c.nodes, 4);
    assert_eq!(c.edges, 4);

    let mut buf = vec![];
    c.write(&mut buf).unwrap();
    assert_eq!(GraphCertificate::read(Cursor::new(&buf)).unwrap(), c);
    assert_eq!(GraphCertificate::from_bytes(&buf), Some(c));

    // truncated input
    assert!(GraphCertificate::read(Cursor::new(&buf[..10])).is_err());
}
