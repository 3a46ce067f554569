//! Ridge-penalised logistic regression over the point-in-time matchup features.
//!
//! Coefficients are found by iteratively reweighted least squares, each step solved as an
//! augmented ridge regression. The penalty strength is chosen by k-fold cross-validation on
//! held-out log-loss, with folds assigned by game so that the mirrored rows of a game never
//! straddle a training/validation split.

use std::time::Instant;

use anyhow::bail;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};
use tracing::debug;

use crate::linear::matrix::Matrix;
use crate::linear::regression::{least_squares, AsIndex, Predictor, Regressor};
use crate::matchup::{Feature, Matchup, MatchupRow};
use crate::model::{FitError, Forecast};
use crate::opt::{univariate_descent, UnivariateDescentConfig};
use crate::stats::{logistic, SliceExt};

const MIN_PROB: f64 = 1e-6;

type Features = [f64; Feature::COUNT];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    pub folds: usize,
    pub max_iterations: u64,
    /// IRLS stops once no coefficient moves by more than this.
    pub tolerance: f64,
    /// Search range of `log10 λ`.
    pub log_lambda_bounds: (f64, f64),
    /// `log10 λ` used when there are too few games to cross-validate, and the starting point of
    /// the search otherwise.
    pub default_log_lambda: f64,
}
impl LogisticConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.folds < 2 {
            bail!("at least two cross-validation folds are required");
        }
        if self.max_iterations == 0 {
            bail!("at least one iteration is required");
        }
        if !(self.tolerance > 0.0) {
            bail!("tolerance must be positive");
        }
        let (lower, upper) = self.log_lambda_bounds;
        if !(lower <= upper) || !(lower..=upper).contains(&self.default_log_lambda) {
            bail!(
                "default log10 λ {} must lie within {:?}",
                self.default_log_lambda,
                self.log_lambda_bounds
            );
        }
        Ok(())
    }
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            max_iterations: 50,
            tolerance: 1e-8,
            log_lambda_bounds: (-4.0, 3.0),
            default_log_lambda: 0.0,
        }
    }
}

/// Centres and scales each feature by its training mean and standard deviation. Constant
/// features are centred only.
#[derive(Debug, Clone, PartialEq)]
struct Standardiser {
    means: Features,
    stdevs: Features,
}
impl Standardiser {
    fn fit(features: &[Features]) -> Self {
        let mut means = [0.0; Feature::COUNT];
        let mut stdevs = [1.0; Feature::COUNT];
        for feature in Feature::iter() {
            let index = feature.as_index();
            let column: Vec<_> = features.iter().map(|row| row[index]).collect();
            if column.is_empty() {
                continue;
            }
            means[index] = column.mean();
            let stdev = column.stdev();
            if stdev > 0.0 {
                stdevs[index] = stdev;
            }
        }
        Self { means, stdevs }
    }

    fn apply(&self, features: &Features) -> Features {
        let mut standardised = [0.0; Feature::COUNT];
        for (index, value) in standardised.iter_mut().enumerate() {
            *value = (features[index] - self.means[index]) / self.stdevs[index];
        }
        standardised
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    predictor: Predictor<Feature>,
    standardiser: Standardiser,
    lambda: f64,
}
impl LogisticModel {
    pub fn fit(rows: &[MatchupRow], config: &LogisticConfig) -> Result<Self, FitError> {
        let start = Instant::now();
        let raw: Vec<_> = rows.iter().map(|row| row.matchup.features()).collect();
        let standardiser = Standardiser::fit(&raw);
        let features: Vec<_> = raw.iter().map(|row| standardiser.apply(row)).collect();
        let outcomes: Vec<_> = rows.iter().map(|row| row.outcome).collect();
        let games: Vec<_> = rows.iter().map(|row| row.game).collect();
        let regressors = regressors();

        let distinct_games = games.iter().collect::<FxHashSet<_>>().len();
        let log_lambda = if distinct_games >= config.folds {
            let (lower, upper) = config.log_lambda_bounds;
            let search = UnivariateDescentConfig {
                init_value: config.default_log_lambda,
                init_step: 1.0,
                min_step: 0.05,
                max_steps: 50,
                acceptable_residual: 0.0,
                bounds: lower..=upper,
            };
            let outcome = univariate_descent(&search, |log_lambda| {
                cross_validated_loss(
                    &regressors,
                    &features,
                    &outcomes,
                    &games,
                    10f64.powf(log_lambda),
                    config,
                )
            })?;
            outcome.optimal_value
        } else {
            config.default_log_lambda
        };

        let lambda = 10f64.powf(log_lambda);
        let coefficients = irls(&regressors, &features, &outcomes, lambda, config)?;
        debug!(
            "fitted logistic model over {} rows in {:?}; λ: {lambda:.4}, coefficients: {coefficients:?}",
            rows.len(),
            start.elapsed()
        );
        Ok(Self {
            predictor: Predictor {
                regressors,
                coefficients,
            },
            standardiser,
            lambda,
        })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn predictor(&self) -> &Predictor<Feature> {
        &self.predictor
    }
}

impl Forecast for LogisticModel {
    fn win_probability(&self, matchup: &Matchup) -> f64 {
        let features = self.standardiser.apply(&matchup.features());
        clamp_prob(logistic(self.predictor.predict(&features)))
    }
}

fn regressors() -> Vec<Regressor<Feature>> {
    let mut regressors = vec![Regressor::Intercept];
    regressors.extend(Feature::iter().map(Regressor::Variable));
    regressors
}

#[inline]
fn clamp_prob(prob: f64) -> f64 {
    prob.clamp(MIN_PROB, 1.0 - MIN_PROB)
}

fn log_loss(outcome: f64, prob: f64) -> f64 {
    let prob = clamp_prob(prob);
    -(outcome * prob.ln() + (1.0 - outcome) * (1.0 - prob).ln())
}

/// Mean held-out log-loss across folds; infinite if any fold fails to fit.
fn cross_validated_loss(
    regressors: &[Regressor<Feature>],
    features: &[Features],
    outcomes: &[f64],
    games: &[usize],
    lambda: f64,
    config: &LogisticConfig,
) -> f64 {
    let mut total_loss = 0.0;
    let mut validated = 0;
    for fold in 0..config.folds {
        let (mut train_features, mut train_outcomes) = (vec![], vec![]);
        let mut held_out = vec![];
        for (index, &game) in games.iter().enumerate() {
            if game % config.folds == fold {
                held_out.push(index);
            } else {
                train_features.push(features[index]);
                train_outcomes.push(outcomes[index]);
            }
        }
        if held_out.is_empty() || train_features.is_empty() {
            continue;
        }
        let Ok(coefficients) = irls(regressors, &train_features, &train_outcomes, lambda, config)
        else {
            return f64::INFINITY;
        };
        let predictor = Predictor {
            regressors: regressors.to_vec(),
            coefficients,
        };
        for index in held_out {
            let prob = logistic(predictor.predict(&features[index]));
            total_loss += log_loss(outcomes[index], prob);
            validated += 1;
        }
    }
    if validated == 0 {
        f64::INFINITY
    } else {
        total_loss / validated as f64
    }
}

fn irls(
    regressors: &[Regressor<Feature>],
    features: &[Features],
    outcomes: &[f64],
    lambda: f64,
    config: &LogisticConfig,
) -> Result<Vec<f64>, anyhow::Error> {
    let penalties: Vec<_> = regressors
        .iter()
        .map(|regressor| if regressor.is_constant() { 0.0 } else { lambda })
        .collect();
    let mut coefficients = vec![0.0; regressors.len()];
    let mut design = Matrix::allocate(features.len(), regressors.len());
    let mut response = vec![0.0; features.len()];
    let mut inputs = vec![0.0; regressors.len()];
    for _ in 0..config.max_iterations {
        for (index, (input, &outcome)) in features.iter().zip(outcomes).enumerate() {
            Predictor::design_row(regressors, input, &mut inputs);
            let eta: f64 = inputs
                .iter()
                .zip(&coefficients)
                .map(|(input, coefficient)| input * coefficient)
                .sum();
            let prob = clamp_prob(logistic(eta));
            let weight = prob * (1.0 - prob);
            let sqrt_weight = weight.sqrt();
            for (cell, input) in design.row_slice_mut(index).iter_mut().zip(&inputs) {
                *cell = sqrt_weight * input;
            }
            response[index] = sqrt_weight * (eta + (outcome - prob) / weight);
        }
        let updated = least_squares(&design, &response, &penalties)?.coefficients;
        let change = updated
            .iter()
            .zip(&coefficients)
            .map(|(updated, current)| (updated - current).abs())
            .fold(0.0, f64::max);
        coefficients = updated;
        if !coefficients.iter().all(|coefficient| coefficient.is_finite()) {
            bail!("IRLS diverged at λ = {lambda}");
        }
        if change < config.tolerance {
            break;
        }
    }
    Ok(coefficients)
}
