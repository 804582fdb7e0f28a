//! Brute-force enumeration oracle shared by the integration tests.
//!
//! For small sentences every head assignment can be enumerated, filtered to
//! valid projective trees, and scored in real space. This gives closed-form
//! partitions, marginals, and exact polynomial derivatives to check the
//! dynamic program against.

#![allow(dead_code)]

use arbora::{
    DepFactor, DepFactorGraph, EdgeKey, RootStyle, Semiring, TripleKey,
};

/// Whether `heads` (external convention, wall = -1) forms a valid tree.
fn is_tree(heads: &[i32]) -> bool {
    let n = heads.len() as i32;
    for (c, &h) in heads.iter().enumerate() {
        if h < -1 || h >= n || h == c as i32 {
            return false;
        }
    }
    // every token must reach the wall without cycling
    for start in 0..heads.len() {
        let mut current = start as i32;
        let mut steps = 0;
        while current >= 0 {
            current = heads[current as usize];
            steps += 1;
            if steps > heads.len() {
                return false;
            }
        }
    }
    true
}

fn is_ancestor(heads: &[i32], ancestor: i32, mut node: i32) -> bool {
    while node >= 0 {
        node = heads[node as usize];
        if node == ancestor {
            return true;
        }
    }
    false
}

/// Whether every token strictly between a head and its modifier descends
/// from that head. Vacuous for wall arcs, which matches the chart: wall
/// attachments partition the sentence into adjacent subtrees.
fn is_projective(heads: &[i32]) -> bool {
    for (c, &h) in heads.iter().enumerate() {
        if h < 0 {
            continue;
        }
        let (lo, hi) = (h.min(c as i32), h.max(c as i32));
        for k in (lo + 1)..hi {
            if !is_ancestor(heads, h, k) {
                return false;
            }
        }
    }
    true
}

/// Every valid projective head assignment for `n` tokens.
pub fn enumerate_projective_trees(n: usize, style: RootStyle) -> Vec<Vec<i32>> {
    if n == 0 {
        return vec![Vec::new()];
    }
    let mut trees = Vec::new();
    let choices = (n + 1) as u64;
    let total = choices.pow(n as u32);
    for code in 0..total {
        let mut heads = Vec::with_capacity(n);
        let mut rest = code;
        for _ in 0..n {
            heads.push((rest % choices) as i32 - 1);
            rest /= choices;
        }
        let roots = heads.iter().filter(|&&h| h == -1).count();
        let rooted_ok = match style {
            RootStyle::SingleRoot => roots == 1,
            RootStyle::MultiRoot => roots >= 1,
        };
        if rooted_ok && is_tree(&heads) && is_projective(&heads) {
            trees.push(heads);
        }
    }
    trees
}

/// Score of one tree in real space: the product of every matching edge and
/// grandparent potential, with absent factors contributing one.
pub fn tree_score<S: Semiring>(heads: &[i32], model: &DepFactorGraph<S>) -> f64 {
    let mut score = 1.0;
    for (c, &h) in heads.iter().enumerate() {
        let c = c as i32;
        if let Some(p) = model.edge_potential(EdgeKey::new(h, c)) {
            score *= p.to_real();
        }
        if h >= 0 {
            let g = heads[h as usize];
            if let Some(p) = model.grandparent_potential(TripleKey::new(g, h, c)) {
                score *= p.to_real();
            }
        }
    }
    score
}

/// Partition function by enumeration.
pub fn brute_partition<S: Semiring>(model: &DepFactorGraph<S>, style: RootStyle) -> f64 {
    enumerate_projective_trees(model.len(), style)
        .iter()
        .map(|t| tree_score(t, model))
        .sum()
}

/// Marginal probability of one edge by enumeration.
pub fn brute_edge_marginal<S: Semiring>(
    model: &DepFactorGraph<S>,
    style: RootStyle,
    key: EdgeKey,
) -> f64 {
    let trees = enumerate_projective_trees(model.len(), style);
    let total: f64 = trees.iter().map(|t| tree_score(t, model)).sum();
    let with_edge: f64 = trees
        .iter()
        .filter(|t| t[key.child as usize] == key.parent)
        .map(|t| tree_score(t, model))
        .sum();
    with_edge / total
}

/// Joint marginal of a grandparent triple's two edges by enumeration.
pub fn brute_triple_marginal<S: Semiring>(
    model: &DepFactorGraph<S>,
    style: RootStyle,
    key: TripleKey,
) -> f64 {
    let trees = enumerate_projective_trees(model.len(), style);
    let total: f64 = trees.iter().map(|t| tree_score(t, model)).sum();
    let with_both: f64 = trees
        .iter()
        .filter(|t| {
            t[key.child as usize] == key.parent && t[key.parent as usize] == key.grandparent
        })
        .map(|t| tree_score(t, model))
        .sum();
    with_both / total
}

/// Exact derivative of the partition with respect to one edge potential:
/// the sum over trees containing the edge of the product of every other
/// potential. Valid even where the potential itself is zero.
pub fn brute_partition_derivative_edge<S: Semiring>(
    model: &DepFactorGraph<S>,
    style: RootStyle,
    key: EdgeKey,
) -> f64 {
    model.edge_potential(key).expect("derivative target must have a factor");
    enumerate_projective_trees(model.len(), style)
        .iter()
        .filter(|t| t[key.child as usize] == key.parent)
        .map(|t| {
            let mut score = 1.0;
            for (c, &h) in t.iter().enumerate() {
                let c = c as i32;
                if !(h == key.parent && c == key.child) {
                    if let Some(p) = model.edge_potential(EdgeKey::new(h, c)) {
                        score *= p.to_real();
                    }
                }
                if h >= 0 {
                    let g = t[h as usize];
                    if let Some(p) = model.grandparent_potential(TripleKey::new(g, h, c)) {
                        score *= p.to_real();
                    }
                }
            }
            score
        })
        .sum()
}

/// Deterministic pseudo-random stream for building test potentials.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed)
    }

    pub fn next_unit(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 11) as f64) / ((u64::MAX >> 11) as f64)
    }

    /// A potential bounded away from zero.
    pub fn next_potential(&mut self) -> f64 {
        0.2 + self.next_unit()
    }
}

/// Whether a grandparent triple is structurally admissible.
pub fn triple_is_admissible(g: i32, p: i32, c: i32) -> bool {
    if p < 0 || g == p || g == c || p == c {
        return false;
    }
    let (lo, hi) = ((p + 1).min(c + 1), (p + 1).max(c + 1));
    let gi = g + 1;
    !(gi >= lo && gi <= hi)
}

/// Builds a factor graph with a potential on every edge and, optionally, on
/// every admissible grandparent triple, drawn from a seeded stream.
pub fn random_model<S: Semiring>(
    n: usize,
    seed: u64,
    with_grandparents: bool,
) -> DepFactorGraph<S> {
    let mut rng = Lcg::new(seed);
    let mut factors = vec![DepFactor::ProjectiveTree];
    let tokens = n as i32;

    for parent in -1..tokens {
        for child in 0..tokens {
            if parent == child {
                continue;
            }
            factors.push(DepFactor::Edge {
                key: EdgeKey::new(parent, child),
                potential: S::from_real(rng.next_potential()),
            });
        }
    }
    if with_grandparents {
        for grandparent in -1..tokens {
            for parent in 0..tokens {
                for child in 0..tokens {
                    if triple_is_admissible(grandparent, parent, child) {
                        factors.push(DepFactor::Grandparent {
                            key: TripleKey::new(grandparent, parent, child),
                            potential: S::from_real(rng.next_potential()),
                        });
                    }
                }
            }
        }
    }

    DepFactorGraph::from_factors(n, factors).expect("generated factors are valid")
}
