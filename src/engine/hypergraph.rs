//! Chart hypergraph for span-based projective parsing with grandparents.
//!
//! Hypernodes are spans keyed by (head, endpoint, grandparent, completeness);
//! the direction of a span is implied by the order of head and endpoint, and
//! singletons have the two equal. An incomplete span is a dependency under
//! construction awaiting its outer attachment point; a complete span is a
//! fully attached subtree. Hyperedges are the productions combining them,
//! following the second-order extension of the classic span recurrences:
//!
//! - incomplete(h, m, g) from complete(h, r, g) and complete(m, r', h),
//!   splitting at each admissible r between h and m;
//! - complete(h, e, g) from incomplete(h, m, g) and complete(m, e, h) for
//!   each m between h and e.
//!
//! Spans rooted at the wall carry only the sentinel grandparent slot 0. In
//! single-root mode the wall's incomplete spans split only at the wall
//! itself and the only wall-complete span built is the full-sentence one, so
//! every derivation uses exactly one wall edge.
//!
//! The chart is an arena of compact integer ids with a flat key table sized
//! `(n + 1)^3 * 2`, rebuilt for every inference call; nodes are never
//! mutated after creation.

use smallvec::SmallVec;

use crate::engine::scores::admissible_grandparents;
use crate::model::RootStyle;

/// Compact identifier of a hypernode within one chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HypernodeId(pub u32);

impl HypernodeId {
    #[inline]
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Completeness of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// A dependency has been built but the span may still grow.
    Incomplete = 0,
    /// A fully attached subtree.
    Complete = 1,
}

/// One span in the chart, keyed by internal positions (wall at 0).
#[derive(Debug, Clone, Copy)]
pub struct Hypernode {
    /// Head position of the span.
    pub head: u32,
    /// Far endpoint; equals `head` for singletons.
    pub endpoint: u32,
    /// Grandparent slot: the head's own head, or 0 for wall-rooted spans.
    pub grandparent: u32,
    /// Completeness of the span.
    pub kind: SpanKind,
}

impl Hypernode {
    /// Whether this node is a base-case singleton with no productions.
    pub fn is_axiom(&self) -> bool {
        self.kind == SpanKind::Complete && self.head == self.endpoint
    }

    /// The covered positions as (low, high).
    pub fn span(&self) -> (usize, usize) {
        let h = self.head as usize;
        let e = self.endpoint as usize;
        (h.min(e), h.max(e))
    }
}

/// A production rule combining tail spans into a head span.
///
/// Productions are recreated each call; their weights are not stored here
/// but read off the score tensor via the head node's key.
#[derive(Debug, Clone)]
pub struct Hyperedge {
    /// The span this production builds.
    pub head: HypernodeId,
    /// The spans it consumes.
    pub tails: SmallVec<[HypernodeId; 2]>,
}

/// The chart hypergraph for one sentence.
#[derive(Debug)]
pub struct ParseHypergraph {
    n: usize,
    nodes: Vec<Hypernode>,
    edges: Vec<Hyperedge>,
    node_ids: Vec<i32>,
    root: HypernodeId,
}

impl ParseHypergraph {
    /// Builds the chart for a sentence of `n` tokens.
    ///
    /// Nodes and hyperedges are created in topological order: singletons,
    /// then spans by increasing width with incomplete spans ahead of
    /// complete ones of the same width. The root is the full-sentence
    /// wall-complete span; for `n == 0` it is the wall singleton, whose
    /// inside value is the multiplicative identity.
    pub fn build(n: usize, root_style: RootStyle) -> Self {
        let side = n + 1;
        let mut chart = ParseHypergraph {
            n,
            nodes: Vec::new(),
            edges: Vec::new(),
            node_ids: vec![-1; side * side * side * 2],
            root: HypernodeId(0),
        };

        for h in 0..=n {
            for g in admissible_grandparents(h, h, n) {
                chart.add_node(h, h, g, SpanKind::Complete);
            }
        }

        for width in 1..=n {
            // incomplete spans first: same-width complete spans consume them
            for h in 0..=(n - width) {
                let m = h + width;
                for g in admissible_grandparents(h, m, n) {
                    let node = chart.add_node(h, m, g, SpanKind::Incomplete);
                    let splits = if h == 0 && root_style == RootStyle::SingleRoot {
                        0..1
                    } else {
                        h..m
                    };
                    for r in splits {
                        let left = chart.existing(h, r, g, SpanKind::Complete);
                        let right = chart.existing(m, r + 1, h, SpanKind::Complete);
                        chart.add_edge(node, left, right);
                    }
                }
            }
            for m in 1..=(n - width) {
                let h = m + width;
                for g in admissible_grandparents(m, h, n) {
                    let node = chart.add_node(h, m, g, SpanKind::Incomplete);
                    for r in m..h {
                        let left = chart.existing(m, r, h, SpanKind::Complete);
                        let right = chart.existing(h, r + 1, g, SpanKind::Complete);
                        chart.add_edge(node, left, right);
                    }
                }
            }

            for h in 0..=(n - width) {
                let e = h + width;
                if h == 0 && root_style == RootStyle::SingleRoot && e != n {
                    // a second wall attachment would have to consume this span
                    continue;
                }
                for g in admissible_grandparents(h, e, n) {
                    let node = chart.add_node(h, e, g, SpanKind::Complete);
                    for m in (h + 1)..=e {
                        let incomplete = chart.existing(h, m, g, SpanKind::Incomplete);
                        let subtree = chart.existing(m, e, h, SpanKind::Complete);
                        chart.add_edge(node, incomplete, subtree);
                    }
                }
            }
            for e in 1..=(n - width) {
                let h = e + width;
                for g in admissible_grandparents(e, h, n) {
                    let node = chart.add_node(h, e, g, SpanKind::Complete);
                    for m in e..h {
                        let incomplete = chart.existing(h, m, g, SpanKind::Incomplete);
                        let subtree = chart.existing(m, e, h, SpanKind::Complete);
                        chart.add_edge(node, incomplete, subtree);
                    }
                }
            }
        }

        chart.root = chart.existing(0, n, 0, SpanKind::Complete);
        chart
    }

    #[inline]
    fn key(&self, h: usize, e: usize, g: usize, kind: SpanKind) -> usize {
        let side = self.n + 1;
        ((h * side + e) * side + g) * 2 + kind as usize
    }

    fn add_node(&mut self, h: usize, e: usize, g: usize, kind: SpanKind) -> HypernodeId {
        let id = HypernodeId(self.nodes.len() as u32);
        let key = self.key(h, e, g, kind);
        debug_assert_eq!(self.node_ids[key], -1, "duplicate chart node");
        self.node_ids[key] = id.0 as i32;
        self.nodes.push(Hypernode {
            head: h as u32,
            endpoint: e as u32,
            grandparent: g as u32,
            kind,
        });
        id
    }

    fn add_edge(&mut self, head: HypernodeId, left: HypernodeId, right: HypernodeId) {
        self.edges.push(Hyperedge { head, tails: SmallVec::from_slice(&[left, right]) });
    }

    /// Looks up a node that the build order guarantees to exist.
    #[inline]
    fn existing(&self, h: usize, e: usize, g: usize, kind: SpanKind) -> HypernodeId {
        let id = self.node_ids[self.key(h, e, g, kind)];
        debug_assert!(id >= 0, "chart node ({h}, {e}, {g}, {kind:?}) missing");
        HypernodeId(id as u32)
    }

    /// Looks up a node id by its key, if the chart contains it.
    pub fn node_id(&self, h: usize, e: usize, g: usize, kind: SpanKind) -> Option<HypernodeId> {
        if h > self.n || e > self.n || g > self.n {
            return None;
        }
        let id = self.node_ids[self.key(h, e, g, kind)];
        (id >= 0).then(|| HypernodeId(id as u32))
    }

    /// Sentence length in tokens.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the sentence has no tokens.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// All nodes in creation (topological) order.
    pub fn nodes(&self) -> &[Hypernode] {
        &self.nodes
    }

    /// All hyperedges in creation (topological) order.
    pub fn edges(&self) -> &[Hyperedge] {
        &self.edges
    }

    /// The node whose inside value is the partition function.
    pub fn root(&self) -> HypernodeId {
        self.root
    }

    /// Reads a node by id.
    #[inline]
    pub fn node(&self, id: HypernodeId) -> &Hypernode {
        &self.nodes[id.idx()]
    }
}
