//! Dense score tensor assembled from the factor graph's potentials.
//!
//! Entries live in internal positions `0..=n` with the wall shifted to 0.
//! `scores[h][m][g]` multiplies the unary potential of edge h -> m with the
//! grandparent potential of the triple g -> h -> m, for every admissible
//! combination; everything else stays at the multiplicative identity so it
//! cannot affect products.

use crate::algebra::Semiring;
use crate::engine::errors::InferenceError;
use crate::model::{DepFactorGraph, TripleKey};

/// Whether grandparent position `g` is admissible for a span `[i, j]`.
///
/// All positions are internal (wall at 0). A grandparent inside the span
/// would have to be dominated by the span's head while also heading it, so
/// `i <= g <= j` is invalid. The single exception is the wall sentinel: spans
/// rooted at the wall carry `g == 0`, which stands for "no grandparent".
pub fn admissible_grandparent(i: usize, j: usize, g: usize) -> bool {
    !(g >= i && g <= j) || (i == 0 && g == 0)
}

/// Iterates the grandparent slots actually carried by chart entries for the
/// span `[i, j]`.
///
/// Spans rooted at the wall carry only the sentinel slot 0; every other span
/// carries each position strictly outside it.
pub(crate) fn admissible_grandparents(
    i: usize,
    j: usize,
    n: usize,
) -> impl Iterator<Item = usize> {
    (0..=n).filter(move |&g| if i == 0 { g == 0 } else { g < i || g > j })
}

/// Dense algebra-valued tensor over (head, modifier, grandparent) triples.
///
/// Also used, zero-initialized, as the adjoint accumulator of the backward
/// pass; the two directions share the same indexing.
#[derive(Debug, Clone)]
pub struct ScoreTensor<S> {
    n: usize,
    values: Vec<S>,
}

impl<S: Semiring> ScoreTensor<S> {
    /// A tensor of multiplicative identities for a sentence of `n` tokens.
    pub fn identity(n: usize) -> Self {
        ScoreTensor { n, values: vec![S::one(); (n + 1) * (n + 1) * (n + 1)] }
    }

    /// A tensor of additive identities, for adjoint accumulation.
    pub fn zeros(n: usize) -> Self {
        ScoreTensor { n, values: vec![S::zero(); (n + 1) * (n + 1) * (n + 1)] }
    }

    /// Gathers the model's potentials into a fresh score tensor.
    ///
    /// Fails fast if the model lacks the projective-tree constraint or
    /// carries a grandparent factor whose triple violates admissibility.
    pub fn build(model: &DepFactorGraph<S>) -> Result<Self, InferenceError> {
        if !model.has_tree_constraint() {
            return Err(InferenceError::MissingTreeConstraint);
        }

        let n = model.len();
        let mut tensor = Self::identity(n);

        for &(key, potential) in model.edge_factors() {
            let h = (key.parent + 1) as usize;
            let m = (key.child + 1) as usize;
            let (lo, hi) = (h.min(m), h.max(m));
            for g in admissible_grandparents(lo, hi, n) {
                let i = tensor.index(h, m, g);
                tensor.values[i] = tensor.values[i].times(potential);
            }
        }

        for &(key, potential) in model.grandparent_factors() {
            let g = (key.grandparent + 1) as usize;
            let h = (key.parent + 1) as usize;
            let m = (key.child + 1) as usize;
            let (lo, hi) = (h.min(m), h.max(m));
            if !admissible_grandparent(lo, hi, g) {
                return Err(InferenceError::UnsupportedFactor(format!(
                    "grandparent triple ({}, {}, {}) places the grandparent inside the span",
                    key.grandparent, key.parent, key.child
                )));
            }
            let i = tensor.index(h, m, g);
            tensor.values[i] = tensor.values[i].times(potential);
        }

        Ok(tensor)
    }

    #[inline]
    fn index(&self, h: usize, m: usize, g: usize) -> usize {
        debug_assert!(h <= self.n && m <= self.n && g <= self.n);
        (h * (self.n + 1) + m) * (self.n + 1) + g
    }

    /// Reads the entry for internal (head, modifier, grandparent).
    #[inline]
    pub fn get(&self, h: usize, m: usize, g: usize) -> S {
        self.values[self.index(h, m, g)]
    }

    /// Accumulates into the entry for internal (head, modifier, grandparent).
    #[inline]
    pub fn accumulate(&mut self, h: usize, m: usize, g: usize, value: S) {
        let i = self.index(h, m, g);
        self.values[i] = self.values[i].plus(value);
    }
}

/// Scatters a score-adjoint tensor back into the model's adjoint storage.
///
/// Each score entry is the product of its edge potential and its grandparent
/// potential, so by the product rule each factor's adjoint picks up the other
/// potential as a cofactor.
pub fn scatter_adjoints<S: Semiring>(
    scores_adj: &ScoreTensor<S>,
    model: &mut DepFactorGraph<S>,
) {
    let n = model.len();

    for fi in 0..model.edge_factors().len() {
        let (key, _) = model.edge_factors()[fi];
        let h = (key.parent + 1) as usize;
        let m = (key.child + 1) as usize;
        let (lo, hi) = (h.min(m), h.max(m));
        for g in admissible_grandparents(lo, hi, n) {
            let adjoint = scores_adj.get(h, m, g);
            if adjoint.is_zero() {
                continue;
            }
            let triple = TripleKey::new(g as i32 - 1, key.parent, key.child);
            let cofactor = model.grandparent_potential(triple).unwrap_or_else(S::one);
            model.accumulate_edge_adjoint(key, adjoint.times(cofactor));
        }
    }

    for fi in 0..model.grandparent_factors().len() {
        let (key, _) = model.grandparent_factors()[fi];
        let g = (key.grandparent + 1) as usize;
        let h = (key.parent + 1) as usize;
        let m = (key.child + 1) as usize;
        let adjoint = scores_adj.get(h, m, g);
        if adjoint.is_zero() {
            continue;
        }
        let cofactor = model.edge_potential(key.child_edge()).unwrap_or_else(S::one);
        model.accumulate_grandparent_adjoint(key, adjoint.times(cofactor));
    }
}
