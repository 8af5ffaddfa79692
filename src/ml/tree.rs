//! Second-order regression trees for gradient boosting
//!
//! Trees are grown on per-row gradients and hessians. Candidate thresholds are
//! precomputed per feature ([`FeatureBins`]), either every midpoint between
//! distinct values (exact) or quantile cuts (histogram). Nodes live in a flat
//! arena and are grown level by level.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// How candidate thresholds are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMethod {
    /// Midpoints between consecutive distinct values
    Exact,
    /// At most `max_bins` buckets from quantile cuts
    Histogram { max_bins: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    /// Minimum hessian sum per child (row count under squared loss)
    pub min_child_weight: f64,
    /// L2 penalty on leaf values
    pub lambda: f64,
    /// Minimum loss reduction required to split
    pub gamma: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: Some(3),
            min_child_weight: 1.0,
            lambda: 0.0,
            gamma: 0.0,
        }
    }
}

/// Sorted candidate thresholds per feature
///
/// A value `x` falls in bin `#{t : t < x}`, so a split at threshold index `k`
/// sends bins `0..=k` (that is `x <= thresholds[k]`) to the left child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBins {
    thresholds: Vec<Vec<f64>>,
}

impl FeatureBins {
    pub fn build(rows: &[Vec<f64>], method: SplitMethod) -> Self {
        let n_features = rows.first().map_or(0, Vec::len);
        let thresholds = (0..n_features)
            .map(|j| {
                let mut values: Vec<f64> = rows
                    .iter()
                    .map(|r| r[j])
                    .filter(|v| v.is_finite())
                    .collect();
                values.sort_by(f64::total_cmp);
                feature_thresholds(&values, method)
            })
            .collect();
        Self { thresholds }
    }

    pub fn n_features(&self) -> usize {
        self.thresholds.len()
    }

    pub fn thresholds(&self, feature: usize) -> &[f64] {
        &self.thresholds[feature]
    }

    pub fn bin(&self, feature: usize, value: f64) -> u32 {
        self.thresholds[feature].partition_point(|t| *t < value) as u32
    }

    /// Column-major bin indices, `binned[feature][row]`
    pub fn bin_rows(&self, rows: &[Vec<f64>]) -> Vec<Vec<u32>> {
        (0..self.n_features())
            .map(|j| rows.iter().map(|r| self.bin(j, r[j])).collect())
            .collect()
    }
}

fn feature_thresholds(sorted: &[f64], method: SplitMethod) -> Vec<f64> {
    let mut unique = sorted.to_vec();
    unique.dedup();
    if unique.len() < 2 {
        return Vec::new();
    }

    let midpoints = |values: &[f64]| -> Vec<f64> {
        values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
    };

    match method {
        SplitMethod::Exact => midpoints(&unique),
        SplitMethod::Histogram { max_bins } if unique.len() <= max_bins.max(2) => {
            midpoints(&unique)
        }
        SplitMethod::Histogram { max_bins } => {
            let n = sorted.len();
            let mut cuts: Vec<f64> = (1..max_bins)
                .map(|q| sorted[(q * n / max_bins).min(n - 1)])
                .collect();
            cuts.dedup();
            // the largest value as a cut would leave an empty right side
            if cuts.last() == unique.last() {
                cuts.pop();
            }
            cuts
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
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
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
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
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

#[derive(Debug)]
struct OpenLeaf {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    split: SplitCandidate,
}

/// Grows one tree over pre-binned rows
pub struct TreeGrower<'a> {
    bins: &'a FeatureBins,
    binned: &'a [Vec<u32>],
    params: TreeParams,
}

impl<'a> TreeGrower<'a> {
    pub fn new(bins: &'a FeatureBins, binned: &'a [Vec<u32>], params: TreeParams) -> Self {
        Self {
            bins,
            binned,
            params,
        }
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.params.lambda;
        if denom > 0.0 {
            -g / denom
        } else {
            0.0
        }
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.params.lambda;
        if denom > 0.0 {
            g * g / denom
        } else {
            0.0
        }
    }

    fn can_split_at(&self, depth: usize) -> bool {
        self.params.max_depth.map_or(true, |max| depth < max)
    }

    fn best_split(&self, rows: &[usize], grad: &[f64], hess: &[f64]) -> Option<SplitCandidate> {
        let g_total: f64 = rows.iter().map(|&i| grad[i]).sum();
        let h_total: f64 = rows.iter().map(|&i| hess[i]).sum();
        let parent = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..self.bins.n_features() {
            let n_thresholds = self.bins.thresholds(feature).len();
            if n_thresholds == 0 {
                continue;
            }
            let mut g_hist = vec![0.0; n_thresholds + 1];
            let mut h_hist = vec![0.0; n_thresholds + 1];
            let column = &self.binned[feature];
            for &i in rows {
                let b = column[i] as usize;
                g_hist[b] += grad[i];
                h_hist[b] += hess[i];
            }

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for bin in 0..n_thresholds {
                g_left += g_hist[bin];
                h_left += h_hist[bin];
                let h_right = h_total - h_left;
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                    continue;
                }
                let g_right = g_total - g_left;
                let gain = 0.5
                    * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent)
                    - self.params.gamma;
                if gain > 1e-10 && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }
        best
    }

    /// Grow a tree over `rows`; returns it with the split gain accumulated per feature
    pub fn grow(&self, rows: Vec<usize>, grad: &[f64], hess: &[f64]) -> (RegressionTree, Vec<f64>) {
        let mut gains = vec![0.0; self.bins.n_features()];
        let g: f64 = rows.iter().map(|&i| grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| hess[i]).sum();
        let mut nodes = vec![Node::Leaf {
            value: self.leaf_value(g, h),
        }];

        let mut open: VecDeque<OpenLeaf> = VecDeque::new();
        self.push_open(&mut open, 0, rows, 0, grad, hess);

        while let Some(leaf) = open.pop_front() {
            let SplitCandidate { feature, bin, gain } = leaf.split;
            let column = &self.binned[feature];
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                leaf.rows.iter().partition(|&&i| column[i] as usize <= bin);

            let left = nodes.len();
            let right = left + 1;
            for side in [&left_rows, &right_rows] {
                let g: f64 = side.iter().map(|&i| grad[i]).sum();
                let h: f64 = side.iter().map(|&i| hess[i]).sum();
                nodes.push(Node::Leaf {
                    value: self.leaf_value(g, h),
                });
            }
            nodes[leaf.node] = Node::Split {
                feature,
                threshold: self.bins.thresholds(feature)[bin],
                left,
                right,
            };
            gains[feature] += gain;

            self.push_open(&mut open, left, left_rows, leaf.depth + 1, grad, hess);
            self.push_open(&mut open, right, right_rows, leaf.depth + 1, grad, hess);
        }

        (RegressionTree { nodes }, gains)
    }

    fn push_open(
        &self,
        open: &mut VecDeque<OpenLeaf>,
        node: usize,
        rows: Vec<usize>,
        depth: usize,
        grad: &[f64],
        hess: &[f64],
    ) {
        if !self.can_split_at(depth) {
            return;
        }
        if let Some(split) = self.best_split(&rows, grad, hess) {
            open.push_back(OpenLeaf {
                node,
                rows,
                depth,
                split,
            });
        }
    }
}
