//! Randomized regression trees over the encoded search space.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{FanovaConfig, Observations};
use crate::hyperparameter::Domain;
use crate::rng_util;

/// The part of one dimension that reaches a leaf.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Bound {
    /// An interval of an ordered dimension. Values above `low` and up to
    /// `high` belong to it; the domain's lower end is included as well.
    Interval {
        /// Lower end (exclusive unless it is the domain's lower end).
        low: f64,
        /// Upper end (inclusive).
        high: f64,
    },
    /// Admissible categories of an unordered dimension.
    Categories(Vec<bool>),
    /// Every training row in the leaf had this dimension inactive; the leaf
    /// does not constrain it.
    Inactive,
}

impl Bound {
    pub(crate) fn full(domain: Domain) -> Self {
        match domain {
            Domain::Interval { low, high } => Self::Interval { low, high },
            Domain::Categories(n) => Self::Categories(vec![true; n]),
        }
    }

    /// Share of `domain` covered by this bound, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self, domain: Domain) -> f64 {
        match (self, domain) {
            (
                Self::Interval { low, high },
                Domain::Interval {
                    low: d_low,
                    high: d_high,
                },
            ) => {
                let width = d_high - d_low;
                if width > 0.0 {
                    (high - low) / width
                } else {
                    1.0
                }
            }
            (Self::Categories(mask), Domain::Categories(n)) if n > 0 => {
                mask.iter().filter(|&&admissible| admissible).count() as f64 / n as f64
            }
            _ => 1.0,
        }
    }

    /// Share of `domain` covered by both this bound and `other`.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn overlap(&self, other: &Self, domain: Domain) -> f64 {
        match (self, other, domain) {
            (Self::Inactive, bound, _) | (bound, Self::Inactive, _) => bound.fraction(domain),
            (
                Self::Interval { low: a_low, high: a_high },
                Self::Interval { low: b_low, high: b_high },
                Domain::Interval { low, high },
            ) => {
                let width = high - low;
                if width > 0.0 {
                    (a_high.min(*b_high) - a_low.max(*b_low)).max(0.0) / width
                } else {
                    1.0
                }
            }
            (Self::Categories(a), Self::Categories(b), Domain::Categories(n)) if n > 0 => {
                a.iter().zip(b).filter(|&(&x, &y)| x && y).count() as f64 / n as f64
            }
            _ => self.fraction(domain).min(other.fraction(domain)),
        }
    }

    /// Whether an encoded value lies inside this bound.
    #[must_use]
    pub fn contains(&self, value: f64, domain: Domain) -> bool {
        match (self, domain) {
            (Self::Inactive, _) => true,
            (Self::Interval { low, high }, Domain::Interval { low: d_low, .. }) => {
                (value > *low || *low <= d_low) && value <= *high
            }
            (Self::Categories(mask), _) => {
                category_index(value).is_some_and(|c| mask.get(c).copied().unwrap_or(false))
            }
            (Self::Interval { .. }, Domain::Categories(_)) => false,
        }
    }
}

/// A leaf of a surrogate tree: its bounding box and mean prediction.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Leaf {
    /// One bound per dimension, in search-space order.
    pub bounds: Vec<Bound>,
    /// Mean objective value of the training rows in this leaf.
    pub value: f64,
    /// Number of training rows (with bootstrap repetitions) in this leaf.
    pub n_samples: usize,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
enum SplitRule {
    /// Values `<= threshold` go left.
    Threshold(f64),
    /// Categories marked `true` go left.
    Categories(Vec<bool>),
}

impl SplitRule {
    fn goes_left(&self, value: f64) -> bool {
        match self {
            Self::Threshold(t) => value <= *t,
            Self::Categories(left) => {
                category_index(value).is_some_and(|c| left.get(c).copied().unwrap_or(false))
            }
        }
    }
}

/// A node in the tree (arena-allocated).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
enum Node {
    Leaf(usize),
    Split {
        feature: usize,
        rule: SplitRule,
        left: usize,
        right: usize,
        n_samples: usize,
    },
}

/// A regression tree whose leaves partition the encoded search space.
///
/// Split nodes and leaves live in two flat arenas; the leaves carry their
/// bounding boxes so variance decomposition never has to walk the tree.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurrogateTree {
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
}

impl SurrogateTree {
    /// Grow a tree on the rows of `observations` listed in `indices`.
    pub(crate) fn fit(
        observations: &Observations,
        indices: &[usize],
        config: &FanovaConfig,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let mut builder = TreeBuilder {
            obs: observations,
            config,
            n_candidates: config.candidates_per_split(observations.domains.len()),
            rng,
            nodes: Vec::new(),
            leaves: Vec::new(),
        };
        let bounds = observations
            .domains
            .iter()
            .map(|&d| Bound::full(d))
            .collect();
        builder.build_node(indices, bounds, 0);
        Self {
            nodes: builder.nodes,
            leaves: builder.leaves,
        }
    }

    /// The leaves, which partition the encoded space.
    #[must_use]
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Predict the objective at an encoded configuration.
    ///
    /// An inactive value at a split averages both branches, weighted by
    /// their training rows.
    #[must_use]
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.predict_at(0, x)
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict_at(&self, idx: usize, x: &[f64]) -> f64 {
        match &self.nodes[idx] {
            Node::Leaf(leaf) => self.leaves[*leaf].value,
            Node::Split {
                feature,
                rule,
                left,
                right,
                n_samples,
            } => {
                let value = x.get(*feature).copied().unwrap_or(f64::NAN);
                if value.is_nan() {
                    let l_n = self.n_samples(*left) as f64;
                    let r_n = self.n_samples(*right) as f64;
                    let total = *n_samples as f64;
                    (l_n / total) * self.predict_at(*left, x)
                        + (r_n / total) * self.predict_at(*right, x)
                } else if rule.goes_left(value) {
                    self.predict_at(*left, x)
                } else {
                    self.predict_at(*right, x)
                }
            }
        }
    }

    fn n_samples(&self, idx: usize) -> usize {
        match &self.nodes[idx] {
            Node::Leaf(leaf) => self.leaves[*leaf].n_samples,
            Node::Split { n_samples, .. } => *n_samples,
        }
    }
}

struct TreeBuilder<'a> {
    obs: &'a Observations,
    config: &'a FanovaConfig,
    n_candidates: usize,
    rng: &'a mut fastrand::Rng,
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
}

struct Candidate {
    feature: usize,
    score: f64,
    kind: CandidateKind,
}

enum CandidateKind {
    Threshold(f64),
    /// Categories observed at the node that go left.
    Categories(Vec<usize>),
}

impl TreeBuilder<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn build_node(&mut self, indices: &[usize], bounds: Vec<Bound>, depth: usize) -> usize {
        let obs = self.obs;
        let y = &obs.y;
        let n = indices.len();
        let sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let mean = sum / n as f64;

        // Stopping conditions
        if n < self.config.min_samples_split || self.config.max_depth.is_some_and(|d| depth >= d) {
            return self.push_leaf(indices, bounds, mean);
        }

        #[allow(clippy::float_cmp)]
        if indices.iter().all(|&i| y[i] == y[indices[0]]) {
            return self.push_leaf(indices, bounds, mean);
        }

        let n_features = obs.domains.len();
        let candidates = rng_util::partial_shuffle(n_features, self.n_candidates, self.rng);

        let mut best: Option<Candidate> = None;
        for feature in candidates {
            // Rows inactive on a dimension never take part in splitting it.
            if indices.iter().any(|&i| obs.x[i][feature].is_nan()) {
                continue;
            }
            let found = match obs.domains[feature] {
                Domain::Interval { .. } => self.best_threshold(indices, feature, sum),
                Domain::Categories(k) => self.best_partition(indices, feature, k, sum),
            };
            if let Some(candidate) = found
                && best.as_ref().is_none_or(|b| candidate.score > b.score)
            {
                best = Some(candidate);
            }
        }

        let Some(best) = best.filter(|c| c.score > 0.0) else {
            return self.push_leaf(indices, bounds, mean);
        };

        let feature = best.feature;
        let (rule, left_bound, right_bound) = self.materialize(best, &bounds[feature], indices);
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| rule.goes_left(obs.x[i][feature]));

        if left_indices.is_empty() || right_indices.is_empty() {
            return self.push_leaf(indices, bounds, mean);
        }

        let mut left_bounds = bounds.clone();
        left_bounds[feature] = left_bound;
        let mut right_bounds = bounds;
        right_bounds[feature] = right_bound;

        // Reserve slot for this split node (placeholder replaced below)
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf(usize::MAX));

        let left = self.build_node(&left_indices, left_bounds, depth + 1);
        let right = self.build_node(&right_indices, right_bounds, depth + 1);

        self.nodes[node_idx] = Node::Split {
            feature,
            rule,
            left,
            right,
            n_samples: n,
        };
        node_idx
    }

    fn push_leaf(&mut self, indices: &[usize], mut bounds: Vec<Bound>, value: f64) -> usize {
        for (d, bound) in bounds.iter_mut().enumerate() {
            if indices.iter().all(|&i| self.obs.x[i][d].is_nan()) {
                *bound = Bound::Inactive;
            }
        }
        self.leaves.push(Leaf {
            bounds,
            value,
            n_samples: indices.len(),
        });
        self.nodes.push(Node::Leaf(self.leaves.len() - 1));
        self.nodes.len() - 1
    }

    /// Best midpoint threshold on an ordered dimension.
    ///
    /// Scores are the between-children sum of squares
    /// `S_l²/n_l + S_r²/n_r − S²/n`, i.e. the reduction of within-node
    /// squared error.
    #[allow(clippy::cast_precision_loss)]
    fn best_threshold(&self, indices: &[usize], feature: usize, sum: f64) -> Option<Candidate> {
        let n = indices.len();
        let mut pairs: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (self.obs.x[i][feature], self.obs.y[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let base = sum * sum / n as f64;
        let mut l_sum = 0.0;
        let mut best: Option<Candidate> = None;
        for i in 0..n - 1 {
            l_sum += pairs[i].1;
            #[allow(clippy::float_cmp)]
            if pairs[i].0 == pairs[i + 1].0 {
                continue;
            }
            let l_n = i + 1;
            let r_n = n - l_n;
            if l_n < self.config.min_samples_leaf || r_n < self.config.min_samples_leaf {
                continue;
            }
            let r_sum = sum - l_sum;
            let score = l_sum * l_sum / l_n as f64 + r_sum * r_sum / r_n as f64 - base;
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Candidate {
                    feature,
                    score,
                    kind: CandidateKind::Threshold(f64::midpoint(pairs[i].0, pairs[i + 1].0)),
                });
            }
        }
        best
    }

    /// Best partition of the categories observed at the node.
    ///
    /// Ordering categories by mean target and scanning prefixes finds the
    /// optimal squared-error partition without enumerating all subsets.
    #[allow(clippy::cast_precision_loss)]
    fn best_partition(
        &self,
        indices: &[usize],
        feature: usize,
        n_categories: usize,
        sum: f64,
    ) -> Option<Candidate> {
        let n = indices.len();
        let mut counts = vec![0usize; n_categories];
        let mut sums = vec![0.0; n_categories];
        for &i in indices {
            let c = category_index(self.obs.x[i][feature])?;
            counts[c] += 1;
            sums[c] += self.obs.y[i];
        }

        let mut present: Vec<usize> = (0..n_categories).filter(|&c| counts[c] > 0).collect();
        if present.len() < 2 {
            return None;
        }
        present.sort_by(|&a, &b| {
            let mean_a = sums[a] / counts[a] as f64;
            let mean_b = sums[b] / counts[b] as f64;
            mean_a.total_cmp(&mean_b).then(a.cmp(&b))
        });

        let base = sum * sum / n as f64;
        let (mut l_n, mut l_sum) = (0usize, 0.0);
        let mut best: Option<(f64, usize)> = None;
        for (m, &c) in present.iter().enumerate().take(present.len() - 1) {
            l_n += counts[c];
            l_sum += sums[c];
            let r_n = n - l_n;
            if l_n < self.config.min_samples_leaf || r_n < self.config.min_samples_leaf {
                continue;
            }
            let r_sum = sum - l_sum;
            let score = l_sum * l_sum / l_n as f64 + r_sum * r_sum / r_n as f64 - base;
            if best.is_none_or(|(s, _)| score > s) {
                best = Some((score, m + 1));
            }
        }

        best.map(|(score, split_at)| Candidate {
            feature,
            score,
            kind: CandidateKind::Categories(present[..split_at].to_vec()),
        })
    }

    /// Turn a candidate into a split rule plus the bounds of both children.
    fn materialize(
        &mut self,
        candidate: Candidate,
        bound: &Bound,
        indices: &[usize],
    ) -> (SplitRule, Bound, Bound) {
        match candidate.kind {
            CandidateKind::Threshold(t) => {
                let (low, high) = match *bound {
                    Bound::Interval { low, high } => (low, high),
                    _ => (f64::NEG_INFINITY, f64::INFINITY),
                };
                (
                    SplitRule::Threshold(t),
                    Bound::Interval { low, high: t },
                    Bound::Interval { low: t, high },
                )
            }
            CandidateKind::Categories(observed_left) => {
                let admissible = match bound {
                    Bound::Categories(mask) => mask.clone(),
                    _ => Vec::new(),
                };
                let mut left = vec![false; admissible.len()];
                for c in observed_left {
                    left[c] = true;
                }
                // Categories without rows at this node are assigned at random.
                let observed =
                    self.observed_categories(candidate.feature, admissible.len(), indices);
                for (c, &ok) in admissible.iter().enumerate() {
                    if ok && !observed[c] && self.rng.bool() {
                        left[c] = true;
                    }
                }
                let right: Vec<bool> = admissible
                    .iter()
                    .zip(&left)
                    .map(|(&ok, &l)| ok && !l)
                    .collect();
                (
                    SplitRule::Categories(left.clone()),
                    Bound::Categories(left),
                    Bound::Categories(right),
                )
            }
        }
    }

    fn observed_categories(
        &self,
        feature: usize,
        n_categories: usize,
        indices: &[usize],
    ) -> Vec<bool> {
        let mut observed = vec![false; n_categories];
        for &i in indices {
            if let Some(c) = category_index(self.obs.x[i][feature])
                && c < n_categories
            {
                observed[c] = true;
            }
        }
        observed
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn category_index(value: f64) -> Option<usize> {
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0).then(|| value as usize)
}
