//! Bootstrap-aggregated classification trees.
//!
//! Each tree is grown greedily on a bootstrap resample of the training rows, splitting on the
//! feature threshold that most reduces Gini impurity. A forecast is the mean, across trees, of the
//! win frequency in the leaf the matchup falls into.

use std::time::Instant;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};
use tinyrand::Rand;
use tracing::debug;

use crate::linear::regression::AsIndex;
use crate::matchup::{Feature, Matchup, MatchupRow};
use crate::model::Forecast;
use crate::random;

type Features = [f64; Feature::COUNT];

/// Minimum impurity reduction for a split to be accepted.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub trees: usize,
    pub max_depth: usize,
    /// Smallest number of rows on either side of a split.
    pub min_leaf: usize,
}
impl ForestConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.trees == 0 {
            bail!("at least one tree is required");
        }
        if self.min_leaf == 0 {
            bail!("minimum leaf size must be positive");
        }
        Ok(())
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            max_depth: 6,
            min_leaf: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        win_rate: f64,
    },
    Split {
        feature: Feature,
        threshold: f64,
        below: Box<Node>,
        above: Box<Node>,
    },
}
impl Node {
    fn evaluate(&self, features: &Features) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { win_rate } => return *win_rate,
                Node::Split {
                    feature,
                    threshold,
                    below,
                    above,
                } => {
                    node = if features[feature.as_index()] <= *threshold {
                        below
                    } else {
                        above
                    };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { below, above, .. } => 1 + usize::max(below.depth(), above.depth()),
        }
    }
}

struct Sample {
    features: Features,
    outcome: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<Node>,
}
impl Forest {
    pub fn fit(rows: &[MatchupRow], config: &ForestConfig, seed: u64) -> Self {
        let start = Instant::now();
        let samples: Vec<_> = rows
            .iter()
            .map(|row| Sample {
                features: row.matchup.features(),
                outcome: row.outcome,
            })
            .collect();
        let mut rand = random::seeded(seed);
        let trees: Vec<_> = (0..config.trees)
            .map(|_| {
                let mut bootstrap: Vec<_> = (0..samples.len())
                    .map(|_| &samples[random::next_index(&mut rand, samples.len())])
                    .collect();
                grow(&mut bootstrap, 0, config)
            })
            .collect();
        debug!(
            "grew {} trees over {} rows in {:?}; max depth: {}",
            trees.len(),
            rows.len(),
            start.elapsed(),
            trees.iter().map(Node::depth).max().unwrap_or(0)
        );
        Self { trees }
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Forecast for Forest {
    fn win_probability(&self, matchup: &Matchup) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let features = matchup.features();
        let total: f64 = self.trees.iter().map(|tree| tree.evaluate(&features)).sum();
        total / self.trees.len() as f64
    }
}

#[inline]
fn gini(wins: f64, count: f64) -> f64 {
    let rate = wins / count;
    2.0 * rate * (1.0 - rate)
}

fn grow(samples: &mut [&Sample], depth: usize, config: &ForestConfig) -> Node {
    let count = samples.len() as f64;
    let wins: f64 = samples.iter().map(|sample| sample.outcome).sum();
    let leaf = Node::Leaf {
        win_rate: if samples.is_empty() { 0.5 } else { wins / count },
    };
    if depth >= config.max_depth || samples.len() < 2 * config.min_leaf || wins == 0.0 || wins == count
    {
        return leaf;
    }

    let parent_impurity = count * gini(wins, count);
    let mut best: Option<(Feature, f64, f64)> = None;
    for feature in Feature::iter() {
        let index = feature.as_index();
        samples.sort_by(|a, b| a.features[index].total_cmp(&b.features[index]));
        let mut wins_below = 0.0;
        for split in 1..samples.len() {
            wins_below += samples[split - 1].outcome;
            let (previous, next) = (samples[split - 1].features[index], samples[split].features[index]);
            if previous == next || split < config.min_leaf || samples.len() - split < config.min_leaf {
                continue;
            }
            let count_below = split as f64;
            let count_above = count - count_below;
            let impurity = count_below * gini(wins_below, count_below)
                + count_above * gini(wins - wins_below, count_above);
            if best.map_or(true, |(_, _, best_impurity)| impurity < best_impurity) {
                best = Some((feature, (previous + next) / 2.0, impurity));
            }
        }
    }

    match best {
        Some((feature, threshold, impurity)) if parent_impurity - impurity > MIN_GAIN => {
            let index = feature.as_index();
            samples.sort_by(|a, b| a.features[index].total_cmp(&b.features[index]));
            let boundary = samples.partition_point(|sample| sample.features[index] <= threshold);
            let (below, above) = samples.split_at_mut(boundary);
            Node::Split {
                feature,
                threshold,
                below: Box::new(grow(below, depth + 1, config)),
                above: Box::new(grow(above, depth + 1, config)),
            }
        }
        _ => leaf,
    }
}
