//! Resumable backtracking search for isomorphisms.
use smallvec::SmallVec;

use crate::{graph::Graph, morphism::Morphism};

const NONE: usize = usize::MAX;

/// A decision point in the search: the domain element that has to be matched
/// and the codomain elements it may be matched to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Decision {
    Edge {
        edge: usize,
        candidates: SmallVec<[usize; 4]>,
    },
    Node {
        node: usize,
        candidates: SmallVec<[usize; 4]>,
    },
}

impl Decision {
    #[inline]
    fn candidates(&self) -> &[usize] {
        match self {
            Decision::Edge { candidates, .. } | Decision::Node { candidates, .. } => candidates,
        }
    }
}

/// A partial, injective map from domain to codomain elements.
pub(crate) struct Matching<'a, N, E> {
    dom: &'a Graph<N, E>,
    cod: &'a Graph<N, E>,
    dom_values: Vec<i32>,
    cod_values: Vec<i32>,
    nodes: Vec<usize>,
    edges: Vec<usize>,
    used_nodes: Vec<bool>,
    used_edges: Vec<bool>,
}

impl<'a, N: PartialEq, E: PartialEq> Matching<'a, N, E> {
    /// Create an empty matching. Nodes may only be matched to nodes with
    /// the same certificate value.
    pub fn new(
        dom: &'a Graph<N, E>,
        cod: &'a Graph<N, E>,
        dom_values: Vec<i32>,
        cod_values: Vec<i32>,
    ) -> Self {
        debug_assert_eq!(dom_values.len(), dom.node_count());
        debug_assert_eq!(cod_values.len(), cod.node_count());

        Matching {
            dom,
            cod,
            dom_values,
            cod_values,
            nodes: vec![NONE; dom.node_count()],
            edges: vec![NONE; dom.edge_count()],
            used_nodes: vec![false; cod.node_count()],
            used_edges: vec![false; cod.edge_count()],
        }
    }

    /// The image of domain node `node`, if it is bound.
    #[inline]
    pub fn image(&self, node: usize) -> Option<usize> {
        let n = self.nodes[node];
        (n != NONE).then_some(n)
    }

    /// Map `dom_node` to `cod_node`. Newly bound nodes are added to `bound`.
    pub fn bind_node(
        &mut self,
        dom_node: usize,
        cod_node: usize,
        bound: &mut SmallVec<[usize; 2]>,
    ) -> bool {
        let cur = self.nodes[dom_node];
        if cur != NONE {
            return cur == cod_node;
        }

        if self.used_nodes[cod_node]
            || self.dom_values[dom_node] != self.cod_values[cod_node]
            || self.dom.node(dom_node).data != self.cod.node(cod_node).data
        {
            return false;
        }

        self.nodes[dom_node] = cod_node;
        self.used_nodes[cod_node] = true;
        bound.push(dom_node);
        true
    }

    /// Map `dom_edge` to `cod_edge`, binding the endpoints along the way.
    /// On failure, nothing is bound.
    pub fn bind_edge(
        &mut self,
        dom_edge: usize,
        cod_edge: usize,
        bound: &mut SmallVec<[usize; 2]>,
    ) -> bool {
        if self.used_edges[cod_edge] {
            return false;
        }

        let (d, c) = (self.dom.edge(dom_edge), self.cod.edge(cod_edge));
        if d.is_loop() != c.is_loop() || d.data != c.data {
            return false;
        }

        let mark = bound.len();
        if !self.bind_node(d.source, c.source, bound)
            || !self.bind_node(d.target, c.target, bound)
        {
            self.unbind_nodes(&bound[mark..]);
            bound.truncate(mark);
            return false;
        }

        self.edges[dom_edge] = cod_edge;
        self.used_edges[cod_edge] = true;
        true
    }

    pub fn unbind_edge(&mut self, dom_edge: usize) {
        let e = std::mem::replace(&mut self.edges[dom_edge], NONE);
        debug_assert!(e != NONE);
        self.used_edges[e] = false;
    }

    pub fn unbind_nodes(&mut self, nodes: &[usize]) {
        for n in nodes {
            let c = std::mem::replace(&mut self.nodes[*n], NONE);
            self.used_nodes[c] = false;
        }
    }

    /// Convert a complete matching into a morphism.
    pub fn morphism(&self) -> Morphism {
        debug_assert!(self.nodes.iter().all(|n| *n != NONE));
        debug_assert!(self.edges.iter().all(|e| *e != NONE));
        Morphism::new(self.nodes.clone(), self.edges.clone())
    }
}

/// A choice point: the candidate currently tried and the nodes it bound.
#[derive(Debug, Default)]
struct Level {
    cursor: usize,
    bound: SmallVec<[usize; 2]>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Fresh,
    Suspended,
    Exhausted,
}

/// The state of a search for isomorphisms between two graphs.
///
/// Every call to [IsoCheckerState::next_isomorphism] resumes the search where the
/// previous call stopped, so that all isomorphisms are generated exactly once.
/// The search can be abandoned at any time, for example when it runs too long.
pub struct IsoCheckerState<'a, N, E> {
    plan: Vec<Decision>,
    matching: Matching<'a, N, E>,
    levels: Vec<Level>,
    status: Status,
}

impl<'a, N: PartialEq, E: PartialEq> IsoCheckerState<'a, N, E> {
    /// Create a search that executes `plan`, starting from the forced bindings in `matching`.
    pub(crate) fn new(plan: Vec<Decision>, matching: Matching<'a, N, E>) -> Self {
        IsoCheckerState {
            plan,
            matching,
            levels: Vec::new(),
            status: Status::Fresh,
        }
    }

    /// Create a search that yields nothing.
    pub(crate) fn exhausted(dom: &'a Graph<N, E>, cod: &'a Graph<N, E>) -> Self {
        IsoCheckerState {
            plan: vec![],
            matching: Matching::new(
                dom,
                cod,
                vec![0; dom.node_count()],
                vec![0; cod.node_count()],
            ),
            levels: vec![],
            status: Status::Exhausted,
        }
    }

    /// The number of decision points in the search plan.
    pub fn plan_len(&self) -> usize {
        self.plan.len()
    }

    /// Returns `true` iff all isomorphisms have been generated.
    pub fn is_exhausted(&self) -> bool {
        self.status == Status::Exhausted
    }

    /// Get the next isomorphism, or `None` if all have been generated.
    pub fn next_isomorphism(&mut self) -> Option<Morphism> {
        let mut forward_pass = match self.status {
            Status::Fresh => true,
            Status::Suspended => false,
            Status::Exhausted => return None,
        };

        loop {
            if forward_pass {
                if self.levels.len() == self.plan.len() {
                    self.status = Status::Suspended;
                    return Some(self.matching.morphism());
                }

                self.levels.push(Level::default());
            } else {
                let depth = match self.levels.len() {
                    0 => {
                        self.status = Status::Exhausted;
                        return None;
                    }
                    l => l - 1,
                };

                // undo the current choice and move on to the next candidate
                let level = &mut self.levels[depth];
                if let Decision::Edge { edge, .. } = &self.plan[depth] {
                    self.matching.unbind_edge(*edge);
                }
                self.matching.unbind_nodes(&level.bound);
                level.bound.clear();
                level.cursor += 1;
            }

            let depth = self.levels.len() - 1;
            if Self::try_candidates(
                &self.plan[depth],
                &mut self.levels[depth],
                &mut self.matching,
            ) {
                forward_pass = true;
            } else {
                self.levels.pop();
                forward_pass = false;
            }
        }
    }

    /// Bind the decision to the first candidate from the cursor on that fits.
    fn try_candidates(
        decision: &Decision,
        level: &mut Level,
        matching: &mut Matching<'a, N, E>,
    ) -> bool {
        let candidates = decision.candidates();
        while level.cursor < candidates.len() {
            let c = candidates[level.cursor];
            let ok = match decision {
                Decision::Edge { edge, .. } => matching.bind_edge(*edge, c, &mut level.bound),
                Decision::Node { node, .. } => matching.bind_node(*node, c, &mut level.bound),
            };

            if ok {
                return true;
            }
            level.cursor += 1;
        }

        false
    }
}

impl<'a, N: PartialEq, E: PartialEq> Iterator for IsoCheckerState<'a, N, E> {
    type Item = Morphism;

    fn next(&mut self) -> Option<Morphism> {
        self.next_isomorphism()
    }
}
