//! Certificates by iterated partition refinement, with symmetry breaking.
//!
//! Every round, each edge combines the values of its endpoints into a new edge value
//! and schedules contributions to both endpoints; every node then folds the scheduled
//! contributions into its own value. The nodes are kept in blocks of equal value that
//! are split after every round. Refinement stops once a round creates no new block.
//!
//! Refinement alone cannot distinguish nodes that are only told apart by global
//! structure, such as the nodes of one 6-cycle versus those of two 3-cycles. In strong
//! mode, every node in the smallest class of tied nodes is therefore perturbed in turn,
//! the perturbation is propagated to a new fixpoint and then rolled back, and the
//! differences it caused are added to all certificates afterwards. Since every member
//! of the class is tried, the outcome does not depend on the numbering of the nodes.
use once_cell::unsync::OnceCell;
use std::hash::Hash;
use tracing::{debug, instrument};

use crate::{
    graph::{label_hash, Empty, Graph, NodeData},
    partition::PartitionMap,
};
use super::{
    block::Partition, CertificateSettings, CertificateStrategy, EdgeCertificate,
    GraphCertificate, NodeCertificate,
};

/// The initial value of nodes without type or value.
const NODE_SEED: i32 = 0x126b;

#[inline(always)]
fn rotate_left(value: i32, shift: u32) -> i32 {
    (value as u32).rotate_left(shift) as i32
}

/// A certificate value that supports checkpoints.
#[derive(Clone, Copy, Debug, Default)]
struct Value {
    current: i32,
    checkpoint: i32,
    /// The sum of the differences observed between checkpoints and rollbacks.
    cumulative: i32,
}

impl Value {
    #[inline]
    fn new(value: i32) -> Value {
        Value {
            current: value,
            checkpoint: 0,
            cumulative: 0,
        }
    }

    #[inline]
    fn checkpoint(&mut self) {
        self.checkpoint = self.current;
    }

    /// Restore the checkpointed value and remember how far it had moved.
    #[inline]
    fn roll_back(&mut self) {
        self.cumulative = self
            .cumulative
            .wrapping_add(self.current.wrapping_sub(self.checkpoint));
        self.current = self.checkpoint;
    }

    /// Fold the remembered differences into the value.
    #[inline]
    fn accumulate(&mut self) {
        self.current = self.current.wrapping_add(self.cumulative);
        self.cumulative = 0;
    }
}

/// A node certificate during refinement.
#[derive(Clone, Copy, Debug)]
struct NodeCert {
    value: Value,
    /// Contributions of the incident edges, applied in the next round.
    next: i32,
}

impl NodeCert {
    /// Schedule a change to the value, applied in the next round.
    #[inline]
    fn modify_value(&mut self, delta: i32) {
        self.next = self.next.wrapping_add(delta);
    }

    #[inline]
    fn advance(&mut self) {
        self.value.current ^= self.next;
        self.next = 0;
    }
}

/// An edge certificate during refinement. Unary edges have `source == target`.
#[derive(Clone, Copy, Debug)]
struct EdgeCert {
    edge: usize,
    source: usize,
    target: usize,
    /// The label-dependent rotation of the target value.
    shift: u32,
    value: Value,
}

impl EdgeCert {
    fn new(edge: usize, source: usize, target: usize, hash: i32, init: i32) -> EdgeCert {
        EdgeCert {
            edge,
            source,
            target,
            shift: ((hash & 0xF) + 1) as u32,
            value: Value::new(init),
        }
    }
}

/// The mutable state of a certificate computation.
struct Refinement {
    nodes: Vec<NodeCert>,
    /// The binary edges followed by the unary edges.
    edges: Vec<EdgeCert>,
    binary_count: usize,
    partition: Partition,
    /// Scratch buffer with the current node values.
    values: Vec<i32>,
    graph_value: i32,
    /// The block count after every round.
    history: Vec<usize>,
}

impl Refinement {
    fn new<N: NodeData, E: Hash>(graph: &Graph<N, E>) -> Refinement {
        let mut nodes: Vec<_> = graph
            .nodes()
            .iter()
            .map(|n| NodeCert {
                value: Value::new(n.data.label_hash().unwrap_or(NODE_SEED)),
                next: 0,
            })
            .collect();

        let mut edges = Vec::with_capacity(graph.edge_count());
        let mut unary = vec![];
        for (i, e) in graph.edges().iter().enumerate() {
            let hash = label_hash(&e.data);
            if e.is_loop() {
                let init = hash << 4;
                let n = &mut nodes[e.source].value.current;
                *n = n.wrapping_add(init);
                unary.push(EdgeCert::new(i, e.source, e.source, hash, init));
            } else {
                let s = &mut nodes[e.source].value.current;
                *s = s.wrapping_add(hash);
                let t = &mut nodes[e.target].value.current;
                *t = t.wrapping_add(hash << 1);
                edges.push(EdgeCert::new(i, e.source, e.target, hash, hash));
            }
        }

        let binary_count = edges.len();
        edges.extend(unary);

        let values: Vec<_> = nodes.iter().map(|n| n.value.current).collect();
        let partition = Partition::new(&values);

        let mut r = Refinement {
            nodes,
            edges,
            binary_count,
            partition,
            values,
            graph_value: 0,
            history: vec![],
        };
        r.graph_value = r.value_sum();
        r.history.push(r.partition.len());
        r
    }

    fn value_sum(&self) -> i32 {
        let nodes = self
            .nodes
            .iter()
            .fold(0i32, |acc, n| acc.wrapping_add(n.value.current));
        self.edges
            .iter()
            .fold(nodes, |acc, e| acc.wrapping_add(e.value.current))
    }

    /// Compute new edge values from the current node values, then new node values.
    fn round(&mut self) {
        let (binary, unary) = self.edges.split_at_mut(self.binary_count);

        for e in binary {
            let source = self.nodes[e.source].value.current;
            let target = self.nodes[e.target].value.current;
            let new = rotate_left(source, 8)
                .wrapping_add(rotate_left(target, e.shift))
                .wrapping_add(e.value.current);
            e.value.current = new;

            self.nodes[e.source].modify_value(new.wrapping_mul(2));
            self.nodes[e.target].modify_value(new.wrapping_mul(-3));
        }

        for e in unary {
            let node = self.nodes[e.source].value.current;
            let new = rotate_left(node, e.shift).wrapping_add(e.value.current);
            e.value.current = new;

            self.nodes[e.source].modify_value(new);
        }

        for n in &mut self.nodes {
            n.advance();
        }

        self.graph_value = self.graph_value.wrapping_add(self.value_sum());
    }

    /// Split the blocks according to the current node values.
    fn split(&mut self) -> usize {
        for (v, n) in self.values.iter_mut().zip(&self.nodes) {
            *v = n.value.current;
        }
        self.partition.split(&self.values)
    }

    /// Refine until a round creates no new block. At least one round is performed.
    fn refine_to_fixpoint(&mut self, settings: &CertificateSettings) {
        loop {
            self.round();
            let new_blocks = self.split();
            self.history.push(self.partition.len());

            if new_blocks == 0 || (settings.stop_when_discrete && self.partition.is_discrete()) {
                break;
            }
        }
    }

    fn checkpoint(&mut self) {
        for n in &mut self.nodes {
            n.value.checkpoint();
        }
        for e in &mut self.edges {
            e.value.checkpoint();
        }
    }

    fn roll_back(&mut self) {
        for n in &mut self.nodes {
            n.value.roll_back();
        }
        for e in &mut self.edges {
            e.value.roll_back();
        }
    }

    fn accumulate(&mut self) {
        for n in &mut self.nodes {
            n.value.accumulate();
        }
        for e in &mut self.edges {
            e.value.accumulate();
        }
    }

    /// Change the value of `node` deterministically and invertibly.
    fn perturb(&mut self, node: usize) {
        let v = self.nodes[node].value.current;
        let mut p = v ^ (v << 5) ^ (v >> 3);
        if p == v {
            p = !v;
        }
        self.nodes[node].value.current = p;
    }

    /// Try to distinguish tied nodes by perturbing every node of the smallest
    /// class in turn and keeping the accumulated effects.
    fn break_symmetries(&mut self, settings: &CertificateSettings) {
        for trial in 0..settings.max_symmetry_rounds {
            if self.partition.is_discrete() {
                break;
            }

            let Some(class) = self.partition.smallest_ambiguous_class() else {
                break;
            };

            if class.len() > settings.max_symmetry_candidates {
                debug!(
                    "Class of {} tied nodes is too large for symmetry breaking",
                    class.len()
                );
                break;
            }

            let before = self.partition.len();
            let saved_partition = self.partition.clone();
            let saved_graph_value = self.graph_value;
            let saved_history = self.history.len();

            self.checkpoint();
            for &c in &class {
                self.perturb(c);
                self.refine_to_fixpoint(settings);
                self.roll_back();
                self.partition.clone_from(&saved_partition);
                self.graph_value = saved_graph_value;
                self.history.truncate(saved_history);
            }

            self.accumulate();
            self.refine_to_fixpoint(settings);

            debug!(
                "Symmetry breaking round {} on {} nodes: {} -> {} blocks",
                trial,
                class.len(),
                before,
                self.partition.len()
            );

            if self.partition.len() == before {
                // the tied nodes are genuinely symmetric
                break;
            }
        }
    }

    fn finish(self) -> Certificates {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| NodeCertificate {
                node: i,
                value: n.value.current,
            })
            .collect::<Vec<_>>();

        let edges = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| EdgeCertificate {
                edge: e.edge,
                value: e.value.current,
                unary: i >= self.binary_count,
            })
            .collect::<Vec<_>>();

        Certificates {
            graph: GraphCertificate {
                value: self.graph_value,
                nodes: nodes.len() as u32,
                edges: edges.len() as u32,
                partitions: self.partition.len() as u32,
            },
            nodes,
            edges,
            binary_count: self.binary_count,
            partition_count: self.partition.len(),
            history: self.history,
        }
    }
}

/// The frozen result of a certificate computation.
#[derive(Debug)]
struct Certificates {
    nodes: Vec<NodeCertificate>,
    edges: Vec<EdgeCertificate>,
    binary_count: usize,
    graph: GraphCertificate,
    partition_count: usize,
    history: Vec<usize>,
}

/// A certificate strategy based on partition refinement, with optional
/// symmetry breaking. The certificates are computed on first use.
pub struct PartitionRefiner<'a, N = Empty, E = Empty> {
    graph: &'a Graph<N, E>,
    settings: CertificateSettings,
    certificates: OnceCell<Certificates>,
    node_partition: OnceCell<PartitionMap<usize>>,
    edge_partition: OnceCell<PartitionMap<usize>>,
}

impl<'a, N: NodeData, E: Hash> PartitionRefiner<'a, N, E> {
    /// Create a strong refiner for `graph`.
    pub fn new(graph: &'a Graph<N, E>) -> Self {
        Self::with_settings(graph, CertificateSettings::default())
    }

    pub fn with_settings(graph: &'a Graph<N, E>, settings: CertificateSettings) -> Self {
        PartitionRefiner {
            graph,
            settings,
            certificates: OnceCell::new(),
            node_partition: OnceCell::new(),
            edge_partition: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &CertificateSettings {
        &self.settings
    }

    /// The number of node classes after initialisation and after every
    /// refinement round, excluding the rounds of symmetry-breaking trials.
    pub fn partition_history(&self) -> &[usize] {
        &self.certificates().history
    }

    /// Returns `true` iff the certificates are already computed.
    pub fn is_computed(&self) -> bool {
        self.certificates.get().is_some()
    }

    fn certificates(&self) -> &Certificates {
        self.certificates.get_or_init(|| self.compute())
    }

    #[instrument(level = "trace", skip_all)]
    fn compute(&self) -> Certificates {
        let mut r = Refinement::new(self.graph);
        r.refine_to_fixpoint(&self.settings);

        if self.settings.strong && !r.partition.is_discrete() {
            r.break_symmetries(&self.settings);
        }

        debug!(
            "Certified graph with {} nodes and {} edges: {} node classes after {} rounds",
            self.graph.node_count(),
            self.graph.edge_count(),
            r.partition.len(),
            r.history.len() - 1
        );

        r.finish()
    }
}

impl<'a, N: NodeData + 'a, E: Hash + 'a> CertificateStrategy<'a, N, E>
    for PartitionRefiner<'a, N, E>
{
    fn new_instance(&self, graph: &'a Graph<N, E>, strong: bool) -> Self {
        Self::with_settings(
            graph,
            CertificateSettings {
                strong,
                ..self.settings.clone()
            },
        )
    }

    #[inline]
    fn graph(&self) -> &'a Graph<N, E> {
        self.graph
    }

    #[inline]
    fn is_strong(&self) -> bool {
        self.settings.strong
    }

    fn graph_certificate(&self) -> GraphCertificate {
        self.certificates().graph
    }

    fn node_certificates(&self) -> &[NodeCertificate] {
        &self.certificates().nodes
    }

    fn edge_certificates(&self) -> &[EdgeCertificate] {
        &self.certificates().edges
    }

    fn binary_edge_count(&self) -> usize {
        self.certificates().binary_count
    }

    fn node_partition_map(&self) -> &PartitionMap<usize> {
        self.node_partition
            .get_or_init(|| PartitionMap::from_certificates(self.node_certificates()))
    }

    fn edge_partition_map(&self) -> &PartitionMap<usize> {
        self.edge_partition
            .get_or_init(|| PartitionMap::from_certificates(self.edge_certificates()))
    }

    fn node_partition_count(&self) -> usize {
        self.certificates().partition_count
    }
}
