//! Component-wise random-walk Metropolis sampling of small, fixed-structure posteriors.
//!
//! Each parameter is updated in turn from its full conditional (Metropolis-within-Gibbs), with a
//! per-parameter proposal scale tuned during warmup towards [`TARGET_ACCEPTANCE`]. A target may
//! also declare [`BlockMove`]s, joint proposals along directions that one-at-a-time updates
//! traverse slowly; these are made once per sweep and tuned the same way. Independent chains run
//! on the rayon pool and are collected in chain order before their draws are pooled. Pooled draws
//! are released only once every parameter passes the split-R̂ check.

use std::ops::Range;
use std::time::Instant;

use anyhow::bail;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tinyrand::Rand;
use tracing::debug;

use crate::linear::matrix::Matrix;
use crate::random;
use crate::stats::SliceExt;

/// Optimal acceptance rate for a one-dimensional random-walk proposal.
pub const TARGET_ACCEPTANCE: f64 = 0.44;

/// Number of warmup iterations between proposal scale adjustments.
const ADAPT_BATCH: u64 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub chains: usize,
    pub warmup: u64,
    pub draws: u64,
    pub max_rhat: f64,
    pub init_step: f64,
    /// Standard deviation of the jitter applied to each chain's starting point.
    pub init_spread: f64,
}
impl SamplerConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.chains == 0 {
            bail!("at least one chain is required");
        }
        const MIN_DRAWS: u64 = 4;
        if self.draws < MIN_DRAWS {
            bail!("number of draws cannot be fewer than {MIN_DRAWS}");
        }
        if self.max_rhat.is_nan() || self.max_rhat < 1.0 {
            bail!("maximum R-hat cannot be less than 1");
        }
        if self.init_step <= 0.0 {
            bail!("initial step must be positive");
        }
        if self.init_spread < 0.0 {
            bail!("initial spread cannot be negative");
        }
        Ok(())
    }

    /// Short chains for when mixing diagnostics matter less than speed (e.g., tests and demos).
    pub fn fast() -> Self {
        Self {
            chains: 2,
            warmup: 300,
            draws: 300,
            max_rhat: 1.5,
            ..Self::default()
        }
    }

    pub fn total_draws(&self) -> usize {
        self.chains * self.draws as usize
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            warmup: 1_000,
            draws: 1_000,
            max_rhat: 1.1,
            init_step: 0.5,
            init_spread: 0.5,
        }
    }
}

/// A joint proposal over several parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockMove {
    /// Adds a common offset `u` to every parameter in the range.
    Translate(Range<usize>),

    /// Multiplies every parameter in `params` by `e^u` and adds `u` to the log-scale parameter
    /// `log_scale`.
    Dilate {
        params: Range<usize>,
        log_scale: usize,
    },
}
impl BlockMove {
    fn apply(&self, params: &mut [f64], u: f64) {
        match self {
            BlockMove::Translate(range) => {
                for value in &mut params[range.clone()] {
                    *value += u;
                }
            }
            BlockMove::Dilate {
                params: range,
                log_scale,
            } => {
                let factor = u.exp();
                for value in &mut params[range.clone()] {
                    *value *= factor;
                }
                params[*log_scale] += u;
            }
        }
    }

    /// Log of the Jacobian determinant of the move.
    fn log_jacobian(&self, u: f64) -> f64 {
        match self {
            BlockMove::Translate(_) => 0.0,
            BlockMove::Dilate { params, .. } => params.len() as f64 * u,
        }
    }
}

/// An unnormalised log posterior, exposed one full conditional at a time.
pub trait LogDensity: Sync {
    fn dim(&self) -> usize;

    /// Centre of the starting distribution of `param`.
    fn initial(&self, param: usize) -> f64;

    /// Log density of the full conditional of `param` at `params`, up to an additive constant.
    /// Terms that do not involve `param` may be omitted.
    fn conditional(&self, params: &[f64], param: usize) -> f64;

    /// Log density of all parameters, up to an additive constant.
    fn joint(&self, params: &[f64]) -> f64;

    fn block_moves(&self) -> Vec<BlockMove> {
        vec![]
    }

    fn describe(&self, param: usize) -> String {
        format!("θ[{param}]")
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SamplingNonConvergenceError {
    #[error("split R-hat of {rhat:.3} for {parameter} exceeds the maximum of {max_rhat}")]
    ExcessiveRhat {
        parameter: String,
        rhat: f64,
        max_rhat: f64,
    },

    #[error("chain {chain} reached a non-finite log density at {parameter}")]
    NonFinite { chain: usize, parameter: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    /// Split-R̂ per parameter.
    pub rhat: Vec<f64>,
    /// Post-warmup acceptance rate per parameter, pooled over chains.
    pub acceptance: Vec<f64>,
    /// Post-warmup acceptance rate per block move, pooled over chains.
    pub block_acceptance: Vec<f64>,
}
impl Diagnostics {
    pub fn max_rhat(&self) -> f64 {
        self.rhat.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean_acceptance(&self) -> f64 {
        self.acceptance.mean()
    }
}

/// Pooled post-warmup draws, one row per draw (chains concatenated in order), one column per
/// parameter.
#[derive(Debug, Clone)]
pub struct Draws {
    pub samples: Matrix<f64>,
    pub diagnostics: Diagnostics,
}

pub fn sample(
    target: &impl LogDensity,
    config: &SamplerConfig,
    seed: u64,
) -> Result<Draws, SamplingNonConvergenceError> {
    let start = Instant::now();
    let dim = target.dim();
    let blocks = target.block_moves();
    let chains = (0..config.chains)
        .into_par_iter()
        .map(|chain| {
            run_chain(
                target,
                &blocks,
                config,
                chain,
                random::derive_seed(seed, chain as u64),
            )
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let mut rhat = Vec::with_capacity(dim);
    for param in 0..dim {
        let columns: Vec<_> = chains
            .iter()
            .map(|chain| chain.samples.column_vec(param))
            .collect();
        let param_rhat = split_rhat(&columns);
        if !(param_rhat <= config.max_rhat) {
            return Err(SamplingNonConvergenceError::ExcessiveRhat {
                parameter: target.describe(param),
                rhat: param_rhat,
                max_rhat: config.max_rhat,
            });
        }
        rhat.push(param_rhat);
    }

    let mut samples = Matrix::with_cols(dim);
    let mut accepted = vec![0; dim];
    let mut block_accepted = vec![0; blocks.len()];
    for chain in &chains {
        samples.append(&chain.samples);
        for (total, count) in accepted.iter_mut().zip(&chain.accepted) {
            *total += count;
        }
        for (total, count) in block_accepted.iter_mut().zip(&chain.block_accepted) {
            *total += count;
        }
    }
    let proposals = (config.draws as usize * chains.len()).max(1) as f64;
    let rate = |count: u64| count as f64 / proposals;
    let diagnostics = Diagnostics {
        rhat,
        acceptance: accepted.into_iter().map(rate).collect(),
        block_acceptance: block_accepted.into_iter().map(rate).collect(),
    };
    debug!(
        "sampled {dim} parameters over {} chains ({} draws) in {:?}; max R-hat: {:.3}, mean acceptance: {:.3}",
        config.chains,
        samples.rows(),
        start.elapsed(),
        diagnostics.max_rhat(),
        diagnostics.mean_acceptance()
    );
    Ok(Draws {
        samples,
        diagnostics,
    })
}

struct Chain {
    samples: Matrix<f64>,
    accepted: Vec<u64>,
    block_accepted: Vec<u64>,
}

/// Acceptance counts and proposal scales, adapted together in batches during warmup.
struct Tuning {
    steps: Vec<f64>,
    batch_accepted: Vec<u64>,
    accepted: Vec<u64>,
}
impl Tuning {
    fn new(len: usize, init_step: f64) -> Self {
        Self {
            steps: vec![init_step; len],
            batch_accepted: vec![0; len],
            accepted: vec![0; len],
        }
    }

    fn record(&mut self, index: usize, warmed_up: bool) {
        self.batch_accepted[index] += 1;
        if warmed_up {
            self.accepted[index] += 1;
        }
    }

    fn adapt(&mut self, delta: f64) {
        for (step, count) in self.steps.iter_mut().zip(self.batch_accepted.iter_mut()) {
            let rate = *count as f64 / ADAPT_BATCH as f64;
            if rate > TARGET_ACCEPTANCE {
                *step *= delta.exp();
            } else {
                *step /= delta.exp();
            }
            *count = 0;
        }
    }
}

fn run_chain(
    target: &impl LogDensity,
    blocks: &[BlockMove],
    config: &SamplerConfig,
    chain: usize,
    seed: u64,
) -> Result<Chain, SamplingNonConvergenceError> {
    let mut rand = random::seeded(seed);
    let dim = target.dim();
    let mut params: Vec<_> = (0..dim)
        .map(|param| random::next_normal(&mut rand, target.initial(param), config.init_spread))
        .collect();
    let mut singles = Tuning::new(dim, config.init_step);
    let mut joint = Tuning::new(blocks.len(), config.init_step);
    let mut samples = Matrix::allocate(config.draws as usize, dim);

    for iteration in 0..config.warmup + config.draws {
        let warmed_up = iteration >= config.warmup;
        for param in 0..dim {
            let current = target.conditional(&params, param);
            if !current.is_finite() {
                return Err(SamplingNonConvergenceError::NonFinite {
                    chain,
                    parameter: target.describe(param),
                });
            }
            let step = singles.steps[param];
            if metropolis_step(target, &mut params, param, step, current, &mut rand) {
                singles.record(param, warmed_up);
            }
        }
        for (index, block) in blocks.iter().enumerate() {
            if block_step(target, block, &mut params, joint.steps[index], &mut rand) {
                joint.record(index, warmed_up);
            }
        }

        if !warmed_up {
            if (iteration + 1) % ADAPT_BATCH == 0 {
                let batch = (iteration + 1) / ADAPT_BATCH;
                let delta = f64::min(0.5, 1.0 / (batch as f64).sqrt());
                singles.adapt(delta);
                joint.adapt(delta);
            }
        } else {
            let draw = (iteration - config.warmup) as usize;
            samples.row_slice_mut(draw).copy_from_slice(&params);
        }
    }
    Ok(Chain {
        samples,
        accepted: singles.accepted,
        block_accepted: joint.accepted,
    })
}

/// Proposes a symmetric move of `param`, returning `true` if it was accepted. A proposal with a
/// non-finite density is always rejected.
#[inline]
fn metropolis_step(
    target: &impl LogDensity,
    params: &mut [f64],
    param: usize,
    step: f64,
    current: f64,
    rand: &mut impl Rand,
) -> bool {
    let previous = params[param];
    params[param] = previous + step * random::next_std_normal(rand);
    let proposed = target.conditional(params, param);
    if proposed.is_finite() && random::next_f64(rand).ln() < proposed - current {
        true
    } else {
        params[param] = previous;
        false
    }
}

/// Proposes a block move with a normally distributed `u`, returning `true` if it was accepted.
fn block_step(
    target: &impl LogDensity,
    block: &BlockMove,
    params: &mut [f64],
    step: f64,
    rand: &mut impl Rand,
) -> bool {
    let current = target.joint(params);
    let previous = params.to_vec();
    let u = step * random::next_std_normal(rand);
    block.apply(params, u);
    let proposed = target.joint(params);
    let log_ratio = proposed - current + block.log_jacobian(u);
    if current.is_finite() && proposed.is_finite() && random::next_f64(rand).ln() < log_ratio {
        true
    } else {
        params.copy_from_slice(&previous);
        false
    }
}

/// Split-R̂ (Gelman-Rubin over half-chains). Each chain is cut into its first and last halves
/// (dropping the middle draw of an odd-length chain); the potential scale reduction compares the
/// between-half variance with the mean within-half variance. Returns 1 when every half is
/// constant and equal, and infinity when the halves are constant but disagree.
pub fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    let half = chains.iter().map(Vec::len).min().unwrap_or(0) / 2;
    if half < 2 {
        return f64::NAN;
    }
    let mut means = Vec::with_capacity(chains.len() * 2);
    let mut variances = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        for segment in [&chain[..half], &chain[chain.len() - half..]] {
            means.push(segment.mean());
            variances.push(segment.variance());
        }
    }
    let n = half as f64;
    let within = variances.mean();
    let between = n * means.variance();
    if within == 0.0 {
        return if between == 0.0 { 1.0 } else { f64::INFINITY };
    }
    let pooled = (n - 1.0) / n * within + between / n;
    (pooled / within).sqrt()
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;

    use super::*;

    struct Normal {
        means: Vec<f64>,
        stdev: f64,
    }

    impl LogDensity for Normal {
        fn dim(&self) -> usize {
            self.means.len()
        }

        fn initial(&self, _: usize) -> f64 {
            0.0
        }

        fn conditional(&self, params: &[f64], param: usize) -> f64 {
            let z = (params[param] - self.means[param]) / self.stdev;
            -0.5 * z * z
        }

        fn joint(&self, params: &[f64]) -> f64 {
            (0..params.len())
                .map(|param| self.conditional(params, param))
                .sum()
        }
    }

    /// Two parameters pinned to differ by 1 but otherwise free to drift together.
    struct Ridge;

    impl LogDensity for Ridge {
        fn dim(&self) -> usize {
            2
        }

        fn initial(&self, _: usize) -> f64 {
            0.0
        }

        fn conditional(&self, params: &[f64], _: usize) -> f64 {
            self.joint(params)
        }

        fn joint(&self, params: &[f64]) -> f64 {
            let gap = (params[0] - params[1] - 1.0) / 0.01;
            -0.5 * gap * gap - 0.5 * (params[0].powi(2) + params[1].powi(2)) / 100.0
        }

        fn block_moves(&self) -> Vec<BlockMove> {
            vec![BlockMove::Translate(0..2)]
        }
    }

    /// `x ~ Normal(0, e^t)`, `t ~ Normal(0, 1)`, with `t` as the log scale of `x`.
    struct Funnel;

    impl LogDensity for Funnel {
        fn dim(&self) -> usize {
            2
        }

        fn initial(&self, _: usize) -> f64 {
            0.0
        }

        fn conditional(&self, params: &[f64], _: usize) -> f64 {
            self.joint(params)
        }

        fn joint(&self, params: &[f64]) -> f64 {
            let (x, t) = (params[0], params[1]);
            -0.5 * t * t - t - 0.5 * (x * (-t).exp()).powi(2)
        }

        fn block_moves(&self) -> Vec<BlockMove> {
            vec![BlockMove::Dilate {
                params: 0..1,
                log_scale: 1,
            }]
        }
    }

    struct Broken;

    impl LogDensity for Broken {
        fn dim(&self) -> usize {
            2
        }

        fn initial(&self, _: usize) -> f64 {
            0.0
        }

        fn conditional(&self, _: &[f64], param: usize) -> f64 {
            if param == 1 {
                f64::NAN
            } else {
                0.0
            }
        }

        fn joint(&self, _: &[f64]) -> f64 {
            f64::NAN
        }

        fn describe(&self, param: usize) -> String {
            format!("broken[{param}]")
        }
    }

    #[test]
    fn recovers_normal_moments() {
        let target = Normal {
            means: vec![3.0, -1.0],
            stdev: 2.0,
        };
        let config = SamplerConfig {
            draws: 2_000,
            ..SamplerConfig::default()
        };
        let draws = sample(&target, &config, 42).unwrap();
        assert_eq!(8_000, draws.samples.rows());
        assert_eq!(2, draws.samples.cols());

        let first = draws.samples.column_vec(0);
        let second = draws.samples.column_vec(1);
        assert_float_absolute_eq!(3.0, first.mean(), 0.3);
        assert_float_absolute_eq!(-1.0, second.mean(), 0.3);
        assert_float_absolute_eq!(2.0, first.stdev(), 0.3);

        assert!(draws.diagnostics.max_rhat() <= 1.1);
        for &acceptance in &draws.diagnostics.acceptance {
            assert!(acceptance > 0.2 && acceptance < 0.7, "acceptance: {acceptance}");
        }
    }

    #[test]
    fn translation_moves_along_a_ridge() {
        let draws = sample(&Ridge, &SamplerConfig::default(), 5).unwrap();
        let first = draws.samples.column_vec(0);
        let second = draws.samples.column_vec(1);
        let gaps: Vec<_> = first.iter().zip(&second).map(|(a, b)| a - b).collect();
        let centres: Vec<_> = first.iter().zip(&second).map(|(a, b)| (a + b) / 2.0).collect();
        assert_float_absolute_eq!(1.0, gaps.mean(), 0.01);
        // the centre is Normal(0, √50)
        assert_float_absolute_eq!(0.0, centres.mean(), 1.5);
        assert_float_absolute_eq!(50f64.sqrt(), centres.stdev(), 1.5);
        assert!(draws.diagnostics.max_rhat() <= 1.1);
        assert_eq!(1, draws.diagnostics.block_acceptance.len());
        assert!(draws.diagnostics.block_acceptance[0] > 0.1);
    }

    #[test]
    fn dilation_crosses_a_funnel() {
        let config = SamplerConfig {
            draws: 2_000,
            ..SamplerConfig::default()
        };
        let draws = sample(&Funnel, &config, 13).unwrap();
        let log_scales = draws.samples.column_vec(1);
        assert_float_absolute_eq!(0.0, log_scales.mean(), 0.15);
        assert_float_absolute_eq!(1.0, log_scales.stdev(), 0.15);
        assert!(draws.diagnostics.max_rhat() <= 1.1);
    }

    #[test]
    fn block_moves_scale_and_shift() {
        let mut params = [1.0, 2.0, 0.5];
        BlockMove::Translate(0..2).apply(&mut params, 1.5);
        assert_eq!([2.5, 3.5, 0.5], params);

        let dilate = BlockMove::Dilate {
            params: 0..2,
            log_scale: 2,
        };
        dilate.apply(&mut params, 2f64.ln());
        assert_float_absolute_eq!(5.0, params[0], 1e-12);
        assert_float_absolute_eq!(7.0, params[1], 1e-12);
        assert_float_absolute_eq!(0.5 + 2f64.ln(), params[2], 1e-12);
        assert_float_absolute_eq!(2.0 * 2f64.ln(), dilate.log_jacobian(2f64.ln()), 1e-12);
        assert_eq!(0.0, BlockMove::Translate(0..2).log_jacobian(1.0));
    }

    #[test]
    fn same_seed_same_draws() {
        let target = Normal {
            means: vec![0.5],
            stdev: 1.0,
        };
        let config = SamplerConfig::fast();
        let first = sample(&target, &config, 7).unwrap();
        let second = sample(&target, &config, 7).unwrap();
        assert_eq!(first.samples, second.samples);
        let third = sample(&target, &config, 8).unwrap();
        assert_ne!(first.samples, third.samples);
    }

    #[test]
    fn non_finite_density_is_surfaced() {
        let err = sample(&Broken, &SamplerConfig::fast(), 0).unwrap_err();
        assert_eq!(
            SamplingNonConvergenceError::NonFinite {
                chain: 0,
                parameter: "broken[1]".into()
            },
            err
        );
    }

    #[test]
    fn rhat_of_agreeing_chains() {
        let chain: Vec<_> = (0..100).map(|i| (i % 7) as f64).collect();
        let rhat = split_rhat(&[chain.clone(), chain]);
        assert!(rhat < 1.05, "rhat: {rhat}");
    }

    #[test]
    fn rhat_of_disagreeing_chains() {
        let low: Vec<_> = (0..100).map(|i| (i % 3) as f64).collect();
        let high: Vec<_> = low.iter().map(|value| value + 10.0).collect();
        assert!(split_rhat(&[low, high]) > 2.0);

        assert_eq!(f64::INFINITY, split_rhat(&[vec![1.0; 10], vec![5.0; 10]]));
        assert_eq!(1.0, split_rhat(&[vec![1.0; 10], vec![1.0; 10]]));
        assert!(split_rhat(&[vec![1.0; 3]]).is_nan());
    }

    #[test]
    fn drifting_chain_fails_rhat() {
        let drift: Vec<_> = (0..200).map(|i| i as f64 / 10.0).collect();
        assert!(split_rhat(&[drift]) > 1.1);
    }

    #[test]
    fn validate() {
        assert!(SamplerConfig::default().validate().is_ok());
        assert!(SamplerConfig::fast().validate().is_ok());
        assert!(SamplerConfig {
            chains: 0,
            ..SamplerConfig::default()
        }
        .validate()
        .is_err());
        assert!(SamplerConfig {
            draws: 3,
            ..SamplerConfig::default()
        }
        .validate()
        .is_err());
        assert!(SamplerConfig {
            max_rhat: 0.9,
            ..SamplerConfig::default()
        }
        .validate()
        .is_err());
    }
}
