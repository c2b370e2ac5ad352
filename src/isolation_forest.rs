//! Isolation forest for multivariate anomaly detection.
//!
//! Anomalies are points that random recursive partitioning isolates
//! quickly: fewer splits, shorter paths, higher scores (Liu, Ting &
//! Zhou 2008). Each tree is grown on a random subsample; a point's
//! score is `2^(-E(h)/c(n))` where `E(h)` is its average path length
//! over the ensemble and `c(n)` the expected unsuccessful-search depth
//! of a binary search tree of the subsample size.
//!
//! Scores live in `[0, 1]`: near 1 means anomalous, near 0.5 average,
//! below that very ordinary. The contamination rate picks the score
//! threshold, targeting that fraction of flagged points.
//!
//! Randomness comes from a seeded linear congruential generator, so a
//! fixed seed yields identical results on every run.
//!
//! # Example
//!
//! ```
//! use datalens::isolation_forest::{fit_predict, ForestOptions};
//!
//! let mut data: Vec<Vec<f64>> = (0..40)
//!     .map(|i| vec![f64::from(i % 7), f64::from(i % 5)])
//!     .collect();
//! data.push(vec![90.0, 90.0]);
//!
//! let outcome = fit_predict(&data, &ForestOptions::default()).unwrap();
//! assert!(outcome.anomaly_indices().contains(&40));
//! ```

use crate::error::PipelineError;

// ── Options ───────────────────────────────────────────────────────────

/// Tuning knobs for the ensemble.
#[derive(Debug, Clone)]
pub struct ForestOptions {
    /// Number of trees. Default: 100.
    pub tree_count: usize,
    /// Subsample size per tree; 0 means `min(256, n)`. Default: 0.
    pub sample_size: usize,
    /// Expected anomaly fraction in `[0, 1]`, used to pick the score
    /// threshold. Default: 0.1.
    pub contamination: f64,
    /// RNG seed. Default: 42.
    pub seed: u64,
}

impl Default for ForestOptions {
    fn default() -> Self {
        Self {
            tree_count: 100,
            sample_size: 0,
            contamination: 0.1,
            seed: 42,
        }
    }
}

impl ForestOptions {
    /// Sets the number of trees.
    pub fn tree_count(mut self, count: usize) -> Self {
        self.tree_count = count;
        self
    }

    /// Sets the contamination rate.
    pub fn contamination(mut self, rate: f64) -> Self {
        self.contamination = rate;
        self
    }

    /// Sets the RNG seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ── Outcome ───────────────────────────────────────────────────────────

/// Scores and flags for every input point.
#[derive(Debug, Clone)]
pub struct ForestOutcome {
    /// Anomaly score per point, in `[0, 1]`.
    pub scores: Vec<f64>,
    /// Whether each point's score reached the threshold.
    pub flagged: Vec<bool>,
    /// Score threshold derived from the contamination rate.
    pub threshold: f64,
}

impl ForestOutcome {
    /// Row indices of flagged points, ascending.
    pub fn anomaly_indices(&self) -> Vec<usize> {
        self.flagged
            .iter()
            .enumerate()
            .filter(|(_, &f)| f)
            .map(|(i, _)| i)
            .collect()
    }
}

// ── Ensemble ──────────────────────────────────────────────────────────

/// Scores every point in `data` (rows of equal width) and flags the
/// most anomalous fraction given by the contamination rate.
pub fn fit_predict(
    data: &[Vec<f64>],
    options: &ForestOptions,
) -> Result<ForestOutcome, PipelineError> {
    let n = data.len();
    if n < 2 {
        return Err(PipelineError::InsufficientData {
            min_required: 2,
            actual: n,
        });
    }
    let width = data[0].len();
    if width == 0 {
        return Err(PipelineError::InvalidParameter {
            name: "data".into(),
            message: "points have no features".into(),
        });
    }
    for point in data {
        if point.len() != width {
            return Err(PipelineError::DimensionMismatch {
                expected: width,
                actual: point.len(),
            });
        }
        if point.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidParameter {
                name: "data".into(),
                message: "non-finite value in input".into(),
            });
        }
    }
    if options.tree_count == 0 {
        return Err(PipelineError::InvalidParameter {
            name: "tree_count".into(),
            message: "must be at least 1".into(),
        });
    }
    if !(0.0..=1.0).contains(&options.contamination) {
        return Err(PipelineError::InvalidParameter {
            name: "contamination".into(),
            message: format!("must be in [0.0, 1.0], got {}", options.contamination),
        });
    }

    let sample_size = if options.sample_size == 0 {
        n.min(256)
    } else {
        options.sample_size.min(n)
    };
    let depth_cap = (sample_size as f64).log2().ceil() as usize;
    let mut rng = SplitRng::new(options.seed);

    let mut trees = Vec::with_capacity(options.tree_count);
    for _ in 0..options.tree_count {
        let sample = sample_rows(n, sample_size, &mut rng);
        let points: Vec<&[f64]> = sample.iter().map(|&i| data[i].as_slice()).collect();
        trees.push(grow(&points, width, depth_cap, &mut rng));
    }

    let norm = average_depth(sample_size);
    let scores: Vec<f64> = data
        .iter()
        .map(|point| {
            let mean_path: f64 = trees
                .iter()
                .map(|tree| path_length(point, tree, 0))
                .sum::<f64>()
                / options.tree_count as f64;
            if norm > 0.0 {
                2.0f64.powf(-mean_path / norm)
            } else {
                0.5
            }
        })
        .collect();

    let mut ranked = scores.clone();
    ranked.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let cutoff = ((n as f64 * options.contamination).ceil() as usize)
        .clamp(1, n)
        - 1;
    let threshold = ranked[cutoff];
    let flagged: Vec<bool> = scores.iter().map(|&s| s >= threshold).collect();

    Ok(ForestOutcome {
        scores,
        flagged,
        threshold,
    })
}

// ── Trees ─────────────────────────────────────────────────────────────

enum Node {
    Split {
        feature: usize,
        cut: f64,
        below: Box<Node>,
        above: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// Grows one isolation tree over a subsample.
fn grow(points: &[&[f64]], width: usize, depth_left: usize, rng: &mut SplitRng) -> Node {
    let n = points.len();
    if n <= 1 || depth_left == 0 {
        return Node::Leaf { size: n };
    }

    let feature = rng.below(width);
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for point in points {
        let v = point[feature];
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if (hi - lo).abs() < 1e-15 {
        return Node::Leaf { size: n };
    }

    let cut = lo + rng.next_unit() * (hi - lo);
    let mut below = Vec::new();
    let mut above = Vec::new();
    for &point in points {
        if point[feature] < cut {
            below.push(point);
        } else {
            above.push(point);
        }
    }
    if below.is_empty() || above.is_empty() {
        return Node::Leaf { size: n };
    }

    Node::Split {
        feature,
        cut,
        below: Box::new(grow(&below, width, depth_left - 1, rng)),
        above: Box::new(grow(&above, width, depth_left - 1, rng)),
    }
}

/// Path length of a point through one tree, with the leaf-size
/// adjustment from the paper.
fn path_length(point: &[f64], node: &Node, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_depth(*size),
        Node::Split {
            feature,
            cut,
            below,
            above,
        } => {
            if point[*feature] < *cut {
                path_length(point, below, depth + 1)
            } else {
                path_length(point, above, depth + 1)
            }
        }
    }
}

/// Expected depth of an unsuccessful binary-search-tree lookup:
/// `c(n) = 2·H(n−1) − 2(n−1)/n`, with `H(i) ≈ ln(i) + γ`.
fn average_depth(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            let harmonic = (n - 1.0).ln() + 0.577_215_664_9;
            2.0 * harmonic - 2.0 * (n - 1.0) / n
        }
    }
}

// ── RNG ───────────────────────────────────────────────────────────────

/// Seeded linear congruential generator; deterministic across runs.
struct SplitRng(u64);

impl SplitRng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Uniform draw in `[0, 1)`.
    fn next_unit(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as f64 / (1u64 << 31) as f64
    }

    /// Uniform draw in `[0, max)`.
    fn below(&mut self, max: usize) -> usize {
        (self.next_unit() * max as f64) as usize % max
    }
}

/// Draws `k` distinct row indices via partial Fisher-Yates.
fn sample_rows(n: usize, k: usize, rng: &mut SplitRng) -> Vec<usize> {
    let k = k.min(n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = i + rng.below(n - i);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

// ── Tests ─────────────────────────────────────────────────────────────
