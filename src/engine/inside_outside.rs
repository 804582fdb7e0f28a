//! Generic forward and backward dynamic program over the chart hypergraph.
//!
//! The forward pass computes inside scores bottom-up, the partition function
//! at the root, outside scores top-down, and normalized hyperedge marginals.
//! The backward pass reverses each forward statement in reverse program
//! order, accumulating adjoints of seeded outputs onto the score tensor.
//! Both passes are written once over the [`Semiring`] interface and
//! monomorphize per algebra.

use crate::algebra::{Ring, Semiring};
use crate::engine::errors::InferenceError;
use crate::engine::hypergraph::{Hyperedge, HypernodeId, ParseHypergraph, SpanKind};
use crate::engine::scores::ScoreTensor;

/// Inside/outside values and hyperedge marginals for one inference call.
///
/// Rebuilt from scratch by every `forward()`; no state survives across
/// sentences.
#[derive(Debug, Clone)]
pub struct ChartValues<S> {
    /// Inside score per hypernode.
    pub beta: Vec<S>,
    /// Outside score per hypernode.
    pub alpha: Vec<S>,
    /// Normalized marginal per hyperedge: the probability that a tree drawn
    /// from the model distribution uses this production.
    pub marginals: Vec<S>,
    /// Inside score at the root: the partition function.
    pub partition: S,
}

/// The weight a production draws from the score tensor.
///
/// Productions that build an incomplete span introduce the dependency that
/// span represents and carry its score; every other production is neutral.
#[inline]
pub(crate) fn production_weight<S: Semiring>(
    graph: &ParseHypergraph,
    scores: &ScoreTensor<S>,
    edge: &Hyperedge,
) -> S {
    let head = graph.node(edge.head);
    match head.kind {
        SpanKind::Incomplete => scores.get(
            head.head as usize,
            head.endpoint as usize,
            head.grandparent as usize,
        ),
        SpanKind::Complete => S::one(),
    }
}

#[inline]
fn tail_product<S: Semiring>(beta: &[S], tails: &[HypernodeId]) -> S {
    let mut product = S::one();
    for tail in tails {
        product = product.times(beta[tail.idx()]);
    }
    product
}

#[inline]
fn tail_product_excluding<S: Semiring>(beta: &[S], tails: &[HypernodeId], skip: usize) -> S {
    let mut product = S::one();
    for (j, tail) in tails.iter().enumerate() {
        if j != skip {
            product = product.times(beta[tail.idx()]);
        }
    }
    product
}

#[inline]
fn tail_product_excluding2<S: Semiring>(
    beta: &[S],
    tails: &[HypernodeId],
    skip_a: usize,
    skip_b: usize,
) -> S {
    let mut product = S::one();
    for (j, tail) in tails.iter().enumerate() {
        if j != skip_a && j != skip_b {
            product = product.times(beta[tail.idx()]);
        }
    }
    product
}

/// Runs the inside recurrence, the outside recurrence, and the hyperedge
/// marginals over a built chart.
///
/// Fails with [`InferenceError::Infeasible`] if the partition function is
/// the algebra's zero: continuing would fabricate marginals out of a model
/// that scores no projective tree above zero.
pub fn forward<S: Semiring>(
    graph: &ParseHypergraph,
    scores: &ScoreTensor<S>,
) -> Result<ChartValues<S>, InferenceError> {
    let mut beta = vec![S::zero(); graph.nodes().len()];
    for (i, node) in graph.nodes().iter().enumerate() {
        if node.is_axiom() {
            beta[i] = S::one();
        }
    }

    for edge in graph.edges() {
        let weight = production_weight(graph, scores, edge);
        let inside = weight.times(tail_product(&beta, &edge.tails));
        let head = edge.head.idx();
        beta[head] = beta[head].plus(inside);
    }

    let partition = beta[graph.root().idx()];
    if partition.is_zero() {
        return Err(InferenceError::Infeasible(format!(
            "no projective tree has nonzero score for {} tokens",
            graph.len()
        )));
    }

    let mut alpha = vec![S::zero(); graph.nodes().len()];
    alpha[graph.root().idx()] = S::one();
    for edge in graph.edges().iter().rev() {
        let weight = production_weight(graph, scores, edge);
        let outer = alpha[edge.head.idx()].times(weight);
        for (i, tail) in edge.tails.iter().enumerate() {
            let contribution = outer.times(tail_product_excluding(&beta, &edge.tails, i));
            let t = tail.idx();
            alpha[t] = alpha[t].plus(contribution);
        }
    }

    let mut marginals = Vec::with_capacity(graph.edges().len());
    for edge in graph.edges() {
        let weight = production_weight(graph, scores, edge);
        let joint = alpha[edge.head.idx()]
            .times(weight)
            .times(tail_product(&beta, &edge.tails));
        marginals.push(joint.divide(partition));
    }

    Ok(ChartValues { beta, alpha, marginals, partition })
}

/// Propagates adjoints of hyperedge marginals and of the partition function
/// back onto the score tensor.
///
/// `marginal_adj` must be aligned with the chart's hyperedges. The reverse
/// program order is: first the marginal expressions themselves, then the
/// outside recurrence reversed over edges in forward order, then the inside
/// recurrence reversed over edges in reverse order, and finally the weight
/// adjoints scattered onto the score entries of their incomplete head spans.
pub fn backward<S: Ring>(
    graph: &ParseHypergraph,
    scores: &ScoreTensor<S>,
    chart: &ChartValues<S>,
    marginal_adj: &[S],
    partition_adj: S,
    scores_adj: &mut ScoreTensor<S>,
) {
    debug_assert_eq!(marginal_adj.len(), graph.edges().len());

    let z = chart.partition;
    let node_count = graph.nodes().len();
    let mut beta_adj = vec![S::zero(); node_count];
    let mut alpha_adj = vec![S::zero(); node_count];
    let mut weight_adj = vec![S::zero(); graph.edges().len()];
    let mut z_adj = partition_adj;

    // marginal(e) = alpha(head) * w * prod(beta(tails)) / Z
    for (i, edge) in graph.edges().iter().enumerate() {
        let m_adj = marginal_adj[i];
        if m_adj.is_zero() {
            continue;
        }
        let weight = production_weight(graph, scores, edge);
        let prod = tail_product(&chart.beta, &edge.tails);
        let outer = chart.alpha[edge.head.idx()];

        let head = edge.head.idx();
        alpha_adj[head] = alpha_adj[head].plus(m_adj.times(weight).times(prod).divide(z));
        weight_adj[i] = weight_adj[i].plus(m_adj.times(outer).times(prod).divide(z));
        for (ti, tail) in edge.tails.iter().enumerate() {
            let partial = tail_product_excluding(&chart.beta, &edge.tails, ti);
            let t = tail.idx();
            beta_adj[t] =
                beta_adj[t].plus(m_adj.times(outer).times(weight).times(partial).divide(z));
        }
        z_adj = z_adj.plus(m_adj.times(chart.marginals[i]).divide(z).negate());
    }

    // Z = beta(root)
    let root = graph.root().idx();
    beta_adj[root] = beta_adj[root].plus(z_adj);

    // outside flowed top-down, so its adjoints flow bottom-up: when an edge
    // is processed every adjoint of its tails is already final
    for (i, edge) in graph.edges().iter().enumerate() {
        let weight = production_weight(graph, scores, edge);
        let outer = chart.alpha[edge.head.idx()];
        for (ti, tail) in edge.tails.iter().enumerate() {
            let t_adj = alpha_adj[tail.idx()];
            if t_adj.is_zero() {
                continue;
            }
            let partial = tail_product_excluding(&chart.beta, &edge.tails, ti);
            let head = edge.head.idx();
            alpha_adj[head] = alpha_adj[head].plus(t_adj.times(weight).times(partial));
            weight_adj[i] = weight_adj[i].plus(t_adj.times(outer).times(partial));
            for (tj, other) in edge.tails.iter().enumerate() {
                if tj == ti {
                    continue;
                }
                let rest = tail_product_excluding2(&chart.beta, &edge.tails, ti, tj);
                let o = other.idx();
                beta_adj[o] =
                    beta_adj[o].plus(t_adj.times(outer).times(weight).times(rest));
            }
        }
    }

    // inside flowed bottom-up, so its adjoints flow top-down
    for (i, edge) in graph.edges().iter().enumerate().rev() {
        let h_adj = beta_adj[edge.head.idx()];
        if h_adj.is_zero() {
            continue;
        }
        let weight = production_weight(graph, scores, edge);
        weight_adj[i] = weight_adj[i].plus(h_adj.times(tail_product(&chart.beta, &edge.tails)));
        for (ti, tail) in edge.tails.iter().enumerate() {
            let partial = tail_product_excluding(&chart.beta, &edge.tails, ti);
            let t = tail.idx();
            beta_adj[t] = beta_adj[t].plus(h_adj.times(weight).times(partial));
        }
    }

    // one contribution per hyperedge whose head carries a score entry
    for (i, edge) in graph.edges().iter().enumerate() {
        if weight_adj[i].is_zero() {
            continue;
        }
        let head = graph.node(edge.head);
        if head.kind == SpanKind::Incomplete {
            scores_adj.accumulate(
                head.head as usize,
                head.endpoint as usize,
                head.grandparent as usize,
                weight_adj[i],
            );
        }
    }
}
