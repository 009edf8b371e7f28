//! Bagged regression trees.
//!
//! Each tree is grown on a bootstrap resample of the rows and considers a
//! random subset of features at every split. The ensemble prediction is the
//! plain mean of the tree predictions.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{FareError, Result};
use crate::features::FeatureVector;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum MaxFeatures {
    All,
    /// Fraction of the feature width, at least one feature.
    Fraction(f64),
    Count(usize),
}

impl MaxFeatures {
    fn resolve(&self, width: usize) -> usize {
        let n = match self {
            Self::All => width,
            Self::Fraction(f) => (width as f64 * f).ceil() as usize,
            Self::Count(n) => *n,
        };
        n.clamp(1, width.max(1))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Fraction(1.0 / 3.0),
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Rejects settings that would yield an empty or degenerate ensemble.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(FareError::InvalidParams {
                reason: reason.to_string(),
            })
        };
        if self.n_trees == 0 {
            return invalid("n_trees must be at least 1");
        }
        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                invalid("max_features fraction must be in (0, 1]")
            }
            MaxFeatures::Count(0) => invalid("max_features count must be at least 1"),
            _ => Ok(()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegressionTree {
    /// Arena of nodes; index 0 is the root.
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Number of rows going left after sorting by `feature`.
    left_len: usize,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: &'a DMatrix<f64>,
    y: &'a [f64],
    params: &'a ForestParams,
    n_candidates: usize,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn build(mut self, mut rows: Vec<usize>) -> RegressionTree {
        self.grow(&mut rows, 0);
        RegressionTree { nodes: self.nodes }
    }

    fn grow(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let idx = self.nodes.len();
        let mean = rows.iter().map(|&r| self.y[r]).sum::<f64>() / rows.len() as f64;
        self.nodes.push(Node::Leaf { value: mean });

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || rows.len() < self.params.min_samples_split.max(2) {
            return idx;
        }

        let Some(best) = self.best_split(rows) else {
            return idx;
        };
        let feature = best.feature;
        rows.sort_by(|&a, &b| self.x[(a, feature)].total_cmp(&self.x[(b, feature)]));
        let (left_rows, right_rows) = rows.split_at_mut(best.left_len);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    /// Best variance-reducing split. Features are visited in a random order
    /// until `n_candidates` of them vary within the node; constant features
    /// do not count toward that budget. Ties keep the first candidate found,
    /// so results depend only on the seed.
    fn best_split(&mut self, rows: &[usize]) -> Option<SplitCandidate> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total: f64 = rows.iter().map(|&r| self.y[r]).sum();
        let total_sq: f64 = rows.iter().map(|&r| self.y[r] * self.y[r]).sum();
        let parent_sse = total_sq - total * total / n as f64;
        if parent_sse <= 1e-12 {
            return None;
        }

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut self.rng);
        let mut sorted: Vec<usize> = rows.to_vec();
        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;

        for feature in features {
            if visited >= self.n_candidates {
                break;
            }
            sorted.sort_by(|&a, &b| self.x[(a, feature)].total_cmp(&self.x[(b, feature)]));
            if self.x[(sorted[0], feature)] == self.x[(sorted[n - 1], feature)] {
                continue;
            }
            visited += 1;

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for i in 0..n - 1 {
                let y = self.y[sorted[i]];
                left_sum += y;
                left_sq += y * y;

                let left_len = i + 1;
                let right_len = n - left_len;
                if left_len < min_leaf || right_len < min_leaf {
                    continue;
                }
                let here = self.x[(sorted[i], feature)];
                let next = self.x[(sorted[i + 1], feature)];
                if here == next {
                    continue;
                }

                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_len as f64)
                    + (right_sq - right_sum * right_sum / right_len as f64);
                let gain = parent_sse - sse;
                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (here + next) / 2.0,
                        left_len,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Fitted ensemble.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ForestModel {
    trees: Vec<RegressionTree>,
    width: usize,
}

impl ForestModel {
    /// Fits the ensemble. Rows of `x` are samples, `y` holds their targets.
    /// The same seed and data always produce the same model.
    pub fn fit(x: &DMatrix<f64>, y: &[f64], params: &ForestParams) -> Self {
        debug_assert_eq!(x.nrows(), y.len(), "one target per row");
        let n = y.len();
        let width = x.ncols();
        let n_candidates = params.max_features.resolve(width);
        let mut master = StdRng::seed_from_u64(params.seed);

        let mut trees = Vec::with_capacity(params.n_trees);
        if n > 0 {
            for _ in 0..params.n_trees {
                let mut rng = StdRng::seed_from_u64(master.random());
                let rows: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                let builder = TreeBuilder {
                    x,
                    y,
                    params,
                    n_candidates,
                    rng,
                    nodes: Vec::new(),
                };
                trees.push(builder.build(rows));
            }
        }

        tracing::debug!(
            trees = trees.len(),
            rows = n,
            width,
            max_depth = trees.iter().map(RegressionTree::depth).max().unwrap_or(0),
            "fitted forest"
        );
        Self { trees, width }
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        debug_assert_eq!(features.len(), self.width);
        if self.trees.is_empty() {
            return 0.0;
        }
        let slice = features.as_slice();
        self.trees.iter().map(|t| t.predict(slice)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn width(&self) -> usize {
        self.width
    }
}
