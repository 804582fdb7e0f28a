//! Variable and factor beliefs read off the hyperedge marginals.
//!
//! The belief of an edge variable is the total marginal mass of the
//! productions building its incomplete spans, summed over every admissible
//! grandparent slot. Factor tables are recovered from those totals with
//! saturating subtraction rather than by re-running the dynamic program per
//! factor. The adjoint half of this module inverts the extraction exactly,
//! turning seeded belief adjoints back into hyperedge-marginal adjoints.

use crate::algebra::{Ring, Semiring};
use crate::engine::hypergraph::{ParseHypergraph, SpanKind};
use crate::engine::inside_outside::ChartValues;
use crate::engine::scores::admissible_grandparents;
use crate::model::{DepFactorGraph, EdgeKey, TripleKey};

#[inline]
pub(crate) fn variable_index(n: usize, parent: usize, child: usize) -> usize {
    debug_assert!(parent <= n && (1..=n).contains(&child));
    parent * n + (child - 1)
}

/// Marginal beliefs for one sentence: a true/false pair per edge variable, a
/// 2x2 joint table per grandparent factor, and the partition value.
///
/// Factor tables are aligned with the model's grandparent-factor order and
/// indexed `[child_edge_state][parent_edge_state]` with 0 = false, 1 = true.
#[derive(Debug, Clone)]
pub struct Beliefs<S> {
    n: usize,
    variables: Vec<[S; 2]>,
    factors: Vec<[[S; 2]; 2]>,
    partition: S,
}

impl<S: Semiring> Beliefs<S> {
    /// Sentence length in tokens.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the sentence has no tokens (and therefore no variables).
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The `[P(false), P(true)]` belief of an edge variable.
    pub fn edge_belief(&self, key: EdgeKey) -> Option<&[S; 2]> {
        let n = self.n as i32;
        if key.parent < -1 || key.parent >= n || key.child < 0 || key.child >= n {
            return None;
        }
        if key.parent == key.child {
            return None;
        }
        let p = (key.parent + 1) as usize;
        let c = (key.child + 1) as usize;
        Some(&self.variables[variable_index(self.n, p, c)])
    }

    /// The joint table of a grandparent factor, looked up through the model
    /// that produced these beliefs.
    pub fn grandparent_belief(
        &self,
        model: &DepFactorGraph<S>,
        key: TripleKey,
    ) -> Option<&[[S; 2]; 2]> {
        model.grandparent_factor_position(key).map(|i| &self.factors[i])
    }

    /// All factor tables, aligned with the model's grandparent-factor order.
    pub fn grandparent_beliefs(&self) -> &[[[S; 2]; 2]] {
        &self.factors
    }

    /// The partition function of the sentence.
    pub fn partition(&self) -> S {
        self.partition
    }
}

/// Adjoint container mirroring the shape of [`Beliefs`].
///
/// Callers seed gradients of their objective here before `backward()`. All
/// entries start at the algebra's additive identity.
#[derive(Debug, Clone)]
pub struct OutputAdjoints<S> {
    n: usize,
    variables: Vec<[S; 2]>,
    factors: Vec<[[S; 2]; 2]>,
    partition: S,
}

impl<S: Semiring> OutputAdjoints<S> {
    pub(crate) fn zeros(n: usize, factor_count: usize) -> Self {
        OutputAdjoints {
            n,
            variables: vec![[S::zero(); 2]; (n + 1) * n],
            factors: vec![[[S::zero(); 2]; 2]; factor_count],
            partition: S::zero(),
        }
    }

    /// Mutable `[adj(false), adj(true)]` pair for an edge variable.
    pub fn edge_adjoint_mut(&mut self, key: EdgeKey) -> Option<&mut [S; 2]> {
        let n = self.n as i32;
        if key.parent < -1 || key.parent >= n || key.child < 0 || key.child >= n {
            return None;
        }
        if key.parent == key.child {
            return None;
        }
        let p = (key.parent + 1) as usize;
        let c = (key.child + 1) as usize;
        Some(&mut self.variables[variable_index(self.n, p, c)])
    }

    /// Mutable joint-table adjoint for the factor at `position` in the
    /// model's grandparent-factor order.
    pub fn factor_adjoint_mut(&mut self, position: usize) -> Option<&mut [[S; 2]; 2]> {
        self.factors.get_mut(position)
    }

    /// Mutable adjoint of the partition output.
    pub fn partition_adjoint_mut(&mut self) -> &mut S {
        &mut self.partition
    }

    pub(crate) fn shape(&self) -> (usize, usize) {
        (self.n, self.factors.len())
    }

    /// Resets every adjoint to the additive identity.
    pub fn zero_all(&mut self) {
        for pair in &mut self.variables {
            *pair = [S::zero(); 2];
        }
        for table in &mut self.factors {
            *table = [[S::zero(); 2]; 2];
        }
        self.partition = S::zero();
    }
}

/// Total marginal mass of the productions of each incomplete span.
fn incomplete_node_marginals<S: Semiring>(
    graph: &ParseHypergraph,
    chart: &ChartValues<S>,
) -> Vec<S> {
    let mut node_marginals = vec![S::zero(); graph.nodes().len()];
    for (i, edge) in graph.edges().iter().enumerate() {
        if graph.node(edge.head).kind == SpanKind::Incomplete {
            let h = edge.head.idx();
            node_marginals[h] = node_marginals[h].plus(chart.marginals[i]);
        }
    }
    node_marginals
}

/// Converts hyperedge marginals into variable and factor beliefs.
pub(crate) fn extract<S: Semiring>(
    graph: &ParseHypergraph,
    chart: &ChartValues<S>,
    model: &DepFactorGraph<S>,
) -> Beliefs<S> {
    let n = graph.len();
    let node_marginals = incomplete_node_marginals(graph, chart);

    let mut variables = vec![[S::one(), S::zero()]; (n + 1) * n];
    for parent in 0..=n {
        for child in 1..=n {
            if child == parent {
                continue;
            }
            let (lo, hi) = (parent.min(child), parent.max(child));
            let mut on = S::zero();
            for g in admissible_grandparents(lo, hi, n) {
                if let Some(id) = graph.node_id(parent, child, g, SpanKind::Incomplete) {
                    on = on.plus(node_marginals[id.idx()]);
                }
            }
            let off = S::one().minus_or_zero(on);
            variables[variable_index(n, parent, child)] = [off, on];
        }
    }

    let mut factors = Vec::with_capacity(model.grandparent_factors().len());
    for &(key, _) in model.grandparent_factors() {
        let g = (key.grandparent + 1) as usize;
        let p = (key.parent + 1) as usize;
        let c = (key.child + 1) as usize;

        let both = graph
            .node_id(p, c, g, SpanKind::Incomplete)
            .map_or_else(S::zero, |id| node_marginals[id.idx()]);
        let child_edge = variables[variable_index(n, p, c)];
        let parent_edge = variables[variable_index(n, g, p)];

        // remaining cells follow from the row and column totals
        let child_only = child_edge[1].minus_or_zero(both);
        let parent_only = parent_edge[1].minus_or_zero(both);
        let neither = child_edge[0].minus_or_zero(parent_only);
        factors.push([[neither, parent_only], [child_only, both]]);
    }

    Beliefs { n, variables, factors, partition: chart.partition }
}

/// Inverts [`extract`]: converts seeded belief adjoints into hyperedge
/// marginal adjoints plus the partition adjoint.
pub(crate) fn backward<S: Ring>(
    graph: &ParseHypergraph,
    model: &DepFactorGraph<S>,
    adjoints: &OutputAdjoints<S>,
) -> (Vec<S>, S) {
    let n = graph.len();

    // fold adj(false) into adj(true) through false = 1 - true
    let mut variable_adj = vec![S::zero(); (n + 1) * n];
    for (i, pair) in adjoints.variables.iter().enumerate() {
        variable_adj[i] = pair[1].plus(pair[0].negate());
    }

    let mut node_marginal_adj = vec![S::zero(); graph.nodes().len()];

    // redistribute each factor table onto its two variables and its span,
    // running the four extraction identities backward
    for (pos, &(key, _)) in model.grandparent_factors().iter().enumerate() {
        let cells = &adjoints.factors[pos];
        let (neither, parent_only) = (cells[0][0], cells[0][1]);
        let (child_only, both) = (cells[1][0], cells[1][1]);

        let g = (key.grandparent + 1) as usize;
        let p = (key.parent + 1) as usize;
        let c = (key.child + 1) as usize;

        let child_idx = variable_index(n, p, c);
        let parent_idx = variable_index(n, g, p);
        variable_adj[child_idx] = variable_adj[child_idx].plus(child_only.minus(neither));
        variable_adj[parent_idx] = variable_adj[parent_idx].plus(parent_only.minus(neither));

        if let Some(id) = graph.node_id(p, c, g, SpanKind::Incomplete) {
            let span_adj = both.minus(child_only).minus(parent_only).plus(neither);
            let i = id.idx();
            node_marginal_adj[i] = node_marginal_adj[i].plus(span_adj);
        }
    }

    // scatter each variable adjoint over its admissible grandparent slots
    for parent in 0..=n {
        for child in 1..=n {
            if child == parent {
                continue;
            }
            let adj = variable_adj[variable_index(n, parent, child)];
            if adj.is_zero() {
                continue;
            }
            let (lo, hi) = (parent.min(child), parent.max(child));
            for g in admissible_grandparents(lo, hi, n) {
                if let Some(id) = graph.node_id(parent, child, g, SpanKind::Incomplete) {
                    let i = id.idx();
                    node_marginal_adj[i] = node_marginal_adj[i].plus(adj);
                }
            }
        }
    }

    // node marginals were sums over productions, so each production of an
    // incomplete span inherits the span's adjoint
    let mut marginal_adj = vec![S::zero(); graph.edges().len()];
    for (i, edge) in graph.edges().iter().enumerate() {
        if graph.node(edge.head).kind == SpanKind::Incomplete {
            marginal_adj[i] = node_marginal_adj[edge.head.idx()];
        }
    }

    (marginal_adj, adjoints.partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Real;
    use crate::engine::inside_outside::forward;
    use crate::engine::scores::ScoreTensor;
    use crate::model::{DepFactor, RootStyle};

    fn run(n: usize, factors: Vec<DepFactor<Real>>) -> (DepFactorGraph<Real>, Beliefs<Real>) {
        let mut all = vec![DepFactor::ProjectiveTree];
        all.extend(factors);
        let model = DepFactorGraph::from_factors(n, all).expect("valid factors");
        let scores = ScoreTensor::build(&model).expect("build scores");
        let graph = ParseHypergraph::build(n, RootStyle::SingleRoot);
        let chart = forward(&graph, &scores).expect("forward");
        let beliefs = extract(&graph, &chart, &model);
        (model, beliefs)
    }

    #[test]
    fn one_token_edge_is_certain() {
        let (_, beliefs) = run(1, vec![]);
        let [off, on] = beliefs.edge_belief(EdgeKey::new(-1, 0)).expect("belief");
        assert!((on.to_real() - 1.0).abs() < 1e-12);
        assert!(off.to_real().abs() < 1e-12);
    }

    #[test]
    fn two_token_uniform_beliefs_are_half() {
        // the two single-root trees are wall->1->2 and wall->2->1
        let (_, beliefs) = run(2, vec![]);
        for key in [
            EdgeKey::new(-1, 0),
            EdgeKey::new(-1, 1),
            EdgeKey::new(0, 1),
            EdgeKey::new(1, 0),
        ] {
            let [off, on] = beliefs.edge_belief(key).expect("belief");
            assert!((on.to_real() - 0.5).abs() < 1e-12, "{key:?}");
            assert!((off.to_real() - 0.5).abs() < 1e-12, "{key:?}");
        }
    }

    #[test]
    fn factor_table_matches_variable_totals() {
        let key = TripleKey::new(-1, 0, 1);
        let (model, beliefs) = run(
            2,
            vec![DepFactor::Grandparent { key, potential: Real(1.0) }],
        );
        let table = beliefs.grandparent_belief(&model, key).expect("table");

        let both = table[1][1].to_real();
        let child_total = both + table[1][0].to_real();
        let parent_total = both + table[0][1].to_real();
        let child_edge = beliefs.edge_belief(key.child_edge()).expect("child");
        let parent_edge = beliefs.edge_belief(key.parent_edge()).expect("parent");
        assert!((child_total - child_edge[1].to_real()).abs() < 1e-12);
        assert!((parent_total - parent_edge[1].to_real()).abs() < 1e-12);

        let sum: f64 = (0..2)
            .flat_map(|a| (0..2).map(move |b| (a, b)))
            .map(|(a, b)| table[a][b].to_real())
            .sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((both - 0.5).abs() < 1e-12);
    }

    #[test]
    fn invalid_keys_have_no_belief() {
        let (_, beliefs) = run(2, vec![]);
        assert!(beliefs.edge_belief(EdgeKey::new(0, 0)).is_none());
        assert!(beliefs.edge_belief(EdgeKey::new(2, 0)).is_none());
        assert!(beliefs.edge_belief(EdgeKey::new(-2, 0)).is_none());
    }
}
