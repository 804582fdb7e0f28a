//! Per-sentence factor graphs over dependency-edge variables.
//!
//! A [`DepFactorGraph`] is the minimal potential-source contract the
//! inference engine consumes: a set of admissible unary edge potentials, a
//! set of grandparent triple potentials, and the global projective-tree
//! constraint, plus adjoint storage keyed by the same identifiers so the
//! backward pass can push gradients upstream.
//!
//! Token positions use the external convention: the synthetic wall root is
//! `-1` and real tokens are `0..n-1`. The engine shifts everything by one
//! internally so all indices are nonnegative.

use rustc_hash::FxHashMap;

use crate::algebra::Semiring;
use crate::engine::errors::InferenceError;

/// Identifies one candidate dependency edge: `parent` heads `child`.
///
/// `parent` ranges over `-1..n-1` (`-1` is the wall root) and `child` over
/// `0..n-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeKey {
    /// Head token, or `-1` for the wall root.
    pub parent: i32,
    /// Modifier token.
    pub child: i32,
}

impl EdgeKey {
    /// Convenience constructor.
    pub fn new(parent: i32, child: i32) -> Self {
        EdgeKey { parent, child }
    }
}

/// Identifies one grandparent interaction: `grandparent` heads `parent`, and
/// `parent` heads `child`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TripleKey {
    /// Head of the parent token, or `-1` for the wall root.
    pub grandparent: i32,
    /// Head of the child token. Cannot be the wall, which has no head itself.
    pub parent: i32,
    /// Modifier token.
    pub child: i32,
}

impl TripleKey {
    /// Convenience constructor.
    pub fn new(grandparent: i32, parent: i32, child: i32) -> Self {
        TripleKey { grandparent, parent, child }
    }

    /// The child edge of this interaction.
    pub fn child_edge(&self) -> EdgeKey {
        EdgeKey::new(self.parent, self.child)
    }

    /// The parent edge of this interaction.
    pub fn parent_edge(&self) -> EdgeKey {
        EdgeKey::new(self.grandparent, self.parent)
    }
}

/// How the wall root may attach to the sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RootStyle {
    /// Exactly one token is a child of the wall.
    #[default]
    SingleRoot,
    /// Any nonzero number of tokens may attach to the wall.
    MultiRoot,
}

/// One factor of a dependency factor graph.
///
/// The engine supports exactly these shapes; anything else is a
/// configuration error rejected at graph construction.
#[derive(Debug, Clone)]
pub enum DepFactor<S> {
    /// Bias-free unary factor on a single edge variable.
    Edge {
        /// The edge variable this factor scores.
        key: EdgeKey,
        /// Multiplicative potential applied when the edge is selected.
        potential: S,
    },
    /// Third-order factor scoring an edge jointly with its parent's edge.
    Grandparent {
        /// The triple this factor scores.
        key: TripleKey,
        /// Multiplicative potential applied when both edges are selected.
        potential: S,
    },
    /// Hard global constraint that selected edges form a projective tree.
    ProjectiveTree,
}

/// A per-sentence factor graph over dependency-edge variables.
///
/// Owned exclusively by one inference call for its duration; the engine
/// reads potentials during `forward()` and accumulates adjoints during
/// `backward()`.
#[derive(Debug, Clone)]
pub struct DepFactorGraph<S> {
    n: usize,
    edge_factors: Vec<(EdgeKey, S)>,
    edge_index: FxHashMap<EdgeKey, usize>,
    grandparent_factors: Vec<(TripleKey, S)>,
    grandparent_index: FxHashMap<TripleKey, usize>,
    has_tree_constraint: bool,
    // adjoint mirrors, allocated on first accumulation
    edge_adjoints: Option<Vec<S>>,
    grandparent_adjoints: Option<Vec<S>>,
}

impl<S: Semiring> DepFactorGraph<S> {
    /// Builds a factor graph for a sentence of `n` tokens from a factor list.
    ///
    /// Validates every factor shape up front: keys must be in range, the wall
    /// cannot be a child or the middle of a triple, and duplicate factors on
    /// the same identifier are rejected. Potentials must not be NaN.
    pub fn from_factors(n: usize, factors: Vec<DepFactor<S>>) -> Result<Self, InferenceError> {
        let mut graph = DepFactorGraph {
            n,
            edge_factors: Vec::new(),
            edge_index: FxHashMap::default(),
            grandparent_factors: Vec::new(),
            grandparent_index: FxHashMap::default(),
            has_tree_constraint: false,
            edge_adjoints: None,
            grandparent_adjoints: None,
        };

        for factor in factors {
            match factor {
                DepFactor::Edge { key, potential } => {
                    graph.validate_edge_key(key)?;
                    check_potential(potential, "edge")?;
                    if graph.edge_index.contains_key(&key) {
                        return Err(InferenceError::UnsupportedFactor(format!(
                            "duplicate edge factor for ({}, {})",
                            key.parent, key.child
                        )));
                    }
                    graph.edge_index.insert(key, graph.edge_factors.len());
                    graph.edge_factors.push((key, potential));
                }
                DepFactor::Grandparent { key, potential } => {
                    graph.validate_triple_key(key)?;
                    check_potential(potential, "grandparent")?;
                    if graph.grandparent_index.contains_key(&key) {
                        return Err(InferenceError::UnsupportedFactor(format!(
                            "duplicate grandparent factor for ({}, {}, {})",
                            key.grandparent, key.parent, key.child
                        )));
                    }
                    graph.grandparent_index.insert(key, graph.grandparent_factors.len());
                    graph.grandparent_factors.push((key, potential));
                }
                DepFactor::ProjectiveTree => {
                    graph.has_tree_constraint = true;
                }
            }
        }

        Ok(graph)
    }

    fn validate_edge_key(&self, key: EdgeKey) -> Result<(), InferenceError> {
        let n = self.n as i32;
        if key.parent < -1 || key.parent >= n || key.child < 0 || key.child >= n {
            return Err(InferenceError::UnsupportedFactor(format!(
                "edge ({}, {}) out of range for {} tokens",
                key.parent, key.child, self.n
            )));
        }
        if key.parent == key.child {
            return Err(InferenceError::UnsupportedFactor(format!(
                "edge ({}, {}) is a self-loop",
                key.parent, key.child
            )));
        }
        Ok(())
    }

    fn validate_triple_key(&self, key: TripleKey) -> Result<(), InferenceError> {
        self.validate_edge_key(key.child_edge())?;
        if key.parent < 0 {
            return Err(InferenceError::UnsupportedFactor(
                "grandparent triple with the wall as parent: the wall has no head".into(),
            ));
        }
        self.validate_edge_key(key.parent_edge())?;
        if key.grandparent == key.child {
            return Err(InferenceError::UnsupportedFactor(format!(
                "grandparent triple ({}, {}, {}) repeats a token",
                key.grandparent, key.parent, key.child
            )));
        }
        Ok(())
    }

    /// Sentence length in tokens, excluding the wall.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the sentence has no tokens.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Whether the global projective-tree constraint is present.
    pub fn has_tree_constraint(&self) -> bool {
        self.has_tree_constraint
    }

    /// The unary potential for an edge, if a factor exists there.
    pub fn edge_potential(&self, key: EdgeKey) -> Option<S> {
        self.edge_index.get(&key).map(|&i| self.edge_factors[i].1)
    }

    /// The potential for a grandparent triple, if a factor exists there.
    pub fn grandparent_potential(&self, key: TripleKey) -> Option<S> {
        self.grandparent_index.get(&key).map(|&i| self.grandparent_factors[i].1)
    }

    /// All grandparent factors, in insertion order.
    ///
    /// Factor beliefs and their adjoints are aligned with this order.
    pub fn grandparent_factors(&self) -> &[(TripleKey, S)] {
        &self.grandparent_factors
    }

    /// Position of a grandparent factor in [`grandparent_factors`] order.
    ///
    /// [`grandparent_factors`]: Self::grandparent_factors
    pub fn grandparent_factor_position(&self, key: TripleKey) -> Option<usize> {
        self.grandparent_index.get(&key).copied()
    }

    /// All unary edge factors, in insertion order.
    pub fn edge_factors(&self) -> &[(EdgeKey, S)] {
        &self.edge_factors
    }

    /// Accumulates an adjoint contribution for an edge factor.
    ///
    /// Contributions for identifiers without a factor are dropped: there is
    /// no parameter behind them to train.
    pub fn accumulate_edge_adjoint(&mut self, key: EdgeKey, adjoint: S) {
        if let Some(&i) = self.edge_index.get(&key) {
            let adjoints = self
                .edge_adjoints
                .get_or_insert_with(|| vec![S::zero(); self.edge_factors.len()]);
            adjoints[i] = adjoints[i].plus(adjoint);
        }
    }

    /// Accumulates an adjoint contribution for a grandparent factor.
    pub fn accumulate_grandparent_adjoint(&mut self, key: TripleKey, adjoint: S) {
        if let Some(&i) = self.grandparent_index.get(&key) {
            let adjoints = self
                .grandparent_adjoints
                .get_or_insert_with(|| vec![S::zero(); self.grandparent_factors.len()]);
            adjoints[i] = adjoints[i].plus(adjoint);
        }
    }

    /// The accumulated adjoint for an edge factor.
    ///
    /// `None` if no factor exists for the key; zero if nothing has been
    /// accumulated yet.
    pub fn edge_adjoint(&self, key: EdgeKey) -> Option<S> {
        let &i = self.edge_index.get(&key)?;
        Some(self.edge_adjoints.as_ref().map_or_else(S::zero, |adj| adj[i]))
    }

    /// The accumulated adjoint for a grandparent factor.
    pub fn grandparent_adjoint(&self, key: TripleKey) -> Option<S> {
        let &i = self.grandparent_index.get(&key)?;
        Some(self.grandparent_adjoints.as_ref().map_or_else(S::zero, |adj| adj[i]))
    }

    /// Resets all accumulated adjoints to the additive identity.
    pub fn zero_adjoints(&mut self) {
        if let Some(adjoints) = self.edge_adjoints.as_mut() {
            adjoints.fill(S::zero());
        }
        if let Some(adjoints) = self.grandparent_adjoints.as_mut() {
            adjoints.fill(S::zero());
        }
    }

    /// Replaces the potential of an existing edge factor.
    ///
    /// Used by training code between gradient steps; `false` if no factor
    /// exists for the key.
    pub fn set_edge_potential(&mut self, key: EdgeKey, potential: S) -> bool {
        match self.edge_index.get(&key) {
            Some(&i) => {
                self.edge_factors[i].1 = potential;
                true
            }
            None => false,
        }
    }

    /// Replaces the potential of an existing grandparent factor.
    pub fn set_grandparent_potential(&mut self, key: TripleKey, potential: S) -> bool {
        match self.grandparent_index.get(&key) {
            Some(&i) => {
                self.grandparent_factors[i].1 = potential;
                true
            }
            None => false,
        }
    }
}

fn check_potential<S: Semiring>(potential: S, what: &str) -> Result<(), InferenceError> {
    if potential.to_real().is_nan() {
        return Err(InferenceError::Numerical(format!("{what} potential is NaN")));
    }
    Ok(())
}
