//! Isolation forest density estimator
//!
//! Anomalies need fewer random splits to isolate. Trees are grown once at
//! training time from the model version's seed and stored as flat node
//! arenas, so inference is a deterministic tree walk.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Euler-Mascheroni constant used by the average path length
const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Forest construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsolationParams {
    /// Number of trees
    pub n_trees: usize,
    /// Rows drawn (without replacement) for each tree
    pub sample_size: usize,
}

/// Node in a tree arena; children are indices into the same arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum IsolationNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<IsolationNode>,
}

impl IsolationTree {
    fn grow(rows: &[&[f64]], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(rows, 0, max_depth, rng);
        tree
    }

    /// Appends the subtree for `rows` and returns its root index
    fn grow_node(&mut self, rows: &[&[f64]], depth: usize, max_depth: usize, rng: &mut StdRng) -> usize {
        let index = self.nodes.len();
        self.nodes.push(IsolationNode::Leaf { size: rows.len() });

        if depth >= max_depth || rows.len() <= 1 {
            return index;
        }

        let n_features = rows[0].len();
        let feature = rng.gen_range(0..n_features);
        let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r[feature]), hi.max(r[feature]))
        });
        if max - min < 1e-12 {
            return index;
        }

        let threshold = rng.gen_range(min..max);
        let (left_rows, right_rows): (Vec<&[f64]>, Vec<&[f64]>) =
            rows.iter().partition(|r| r[feature] < threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return index;
        }

        let left = self.grow_node(&left_rows, depth + 1, max_depth, rng);
        let right = self.grow_node(&right_rows, depth + 1, max_depth, rng);
        self.nodes[index] = IsolationNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    fn path_length(&self, x: &[f64]) -> f64 {
        let mut index = 0;
        let mut depth = 0usize;
        loop {
            match &self.nodes[index] {
                IsolationNode::Leaf { size } => return depth as f64 + average_path_length(*size),
                IsolationNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if x[*feature] < *threshold { *left } else { *right };
                    depth += 1;
                }
            }
        }
    }

    /// Children must come after their parent in the arena, so every walk
    /// moves forward and terminates
    fn is_well_formed(&self, n_features: usize) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(index, node)| match node {
                IsolationNode::Leaf { .. } => true,
                IsolationNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < n_features
                        && threshold.is_finite()
                        && (index + 1..self.nodes.len()).contains(left)
                        && (index + 1..self.nodes.len()).contains(right)
                }
            })
    }
}

/// Average path length of an unsuccessful BST search over `n` items
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Isolation forest over standardised feature rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    n_features: usize,
    sample_size: usize,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Grows the forest from training rows using a seeded generator
    pub fn fit(rows: &[Vec<f64>], params: &IsolationParams, seed: u64) -> Self {
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        let sample_size = params.sample_size.min(rows.len()).max(1);
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let trees = if rows.is_empty() {
            Vec::new()
        } else {
            (0..params.n_trees)
                .map(|_| {
                    let picked: Vec<&[f64]> = sample(&mut rng, rows.len(), sample_size)
                        .into_iter()
                        .map(|i| rows[i].as_slice())
                        .collect();
                    IsolationTree::grow(&picked, max_depth, &mut rng)
                })
                .collect()
        };

        Self {
            n_features,
            sample_size,
            trees,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Anomaly score `2^(-E[h(x)] / c(n))` in (0, 1]; higher is more anomalous
    pub fn anomaly_score(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c > 0.0 {
            2f64.powf(-mean_path / c)
        } else {
            0.5
        }
    }

    /// Fraction of splits made on each feature, a coarse global importance
    pub fn split_frequencies(&self) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_features];
        for tree in &self.trees {
            for node in &tree.nodes {
                if let IsolationNode::Split { feature, .. } = node {
                    if let Some(c) = counts.get_mut(*feature) {
                        *c += 1.0;
                    }
                }
            }
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            counts.iter_mut().for_each(|c| *c /= total);
        }
        counts
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("isolation forest has no trees".to_string());
        }
        if self.trees.iter().any(|t| !t.is_well_formed(self.n_features)) {
            return Err("isolation forest contains a malformed tree".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<Vec<f64>> {
        let mut rows = Vec::new();
        for i in 0..20 {
            for j in 0..10 {
                rows.push(vec![i as f64 * 0.1, j as f64 * 0.1]);
            }
        }
        rows
    }

    #[test]
    fn test_outlier_scores_higher_than_inlier() {
        let params = IsolationParams {
            n_trees: 50,
            sample_size: 128,
        };
        let forest = IsolationForest::fit(&grid(), &params, 42);
        let inlier = forest.anomaly_score(&[1.0, 0.5]);
        let outlier = forest.anomaly_score(&[25.0, -30.0]);
        assert!(outlier > inlier);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let params = IsolationParams {
            n_trees: 10,
            sample_size: 64,
        };
        let a = IsolationForest::fit(&grid(), &params, 7);
        let b = IsolationForest::fit(&grid(), &params, 7);
        assert_eq!(a, b);
        assert!(a.validate().is_ok());
    }

    fn split(feature: usize, left: usize, right: usize) -> IsolationNode {
        IsolationNode::Split {
            feature,
            threshold: 0.5,
            left,
            right,
        }
    }

    #[test]
    fn test_self_referencing_split_is_malformed() {
        let tree = IsolationTree {
            nodes: vec![split(0, 0, 0)],
        };
        assert!(!tree.is_well_formed(2));
    }

    #[test]
    fn test_backward_edge_is_malformed() {
        let tree = IsolationTree {
            nodes: vec![split(0, 1, 2), split(1, 0, 2), IsolationNode::Leaf { size: 3 }],
        };
        assert!(!tree.is_well_formed(2));
    }

    #[test]
    fn test_forward_tree_is_well_formed() {
        let tree = IsolationTree {
            nodes: vec![
                split(0, 1, 2),
                IsolationNode::Leaf { size: 2 },
                IsolationNode::Leaf { size: 1 },
            ],
        };
        assert!(tree.is_well_formed(2));
        assert!(!tree.is_well_formed(0));
        assert!(tree.path_length(&[0.1, 0.0]) > 1.0);
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(16));
    }

    #[test]
    fn test_split_frequencies_sum_to_one() {
        let params = IsolationParams {
            n_trees: 20,
            sample_size: 64,
        };
        let forest = IsolationForest::fit(&grid(), &params, 3);
        let total: f64 = forest.split_frequencies().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
