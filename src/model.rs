//! The uniform fit/forecast contract over every candidate model family.
//!
//! A [`ModelFamily`] is fitted to a window of training rows, producing a [`FittedModel`] that is
//! valid only for forecasting that window's targets. Families differ wildly in what they hold
//! (posterior draws, ratings, coefficients, trees), so the fitted model is a tagged variant that
//! dispatches to the family's [`Forecast`] implementation.

use ordinalizer::Ordinal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, EnumIter};
use thiserror::Error;
use tinyrand::Rand;

use crate::matchup::{Matchup, MatchupRow, TeamIndex};
use crate::model::bayes::{BayesPriors, Likelihood, Posterior};
use crate::model::forest::{Forest, ForestConfig};
use crate::model::heuristic::Heuristic;
use crate::model::logistic::{LogisticConfig, LogisticModel};
use crate::model::rating::{RatingConfig, RatingVariant, Ratings};
use crate::model::sampler::{SamplerConfig, SamplingNonConvergenceError};
use crate::random;

pub mod bayes;
pub mod forest;
pub mod heuristic;
pub mod logistic;
pub mod rating;
pub mod sampler;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("insufficient data: {teams} teams across {rows} rows")]
pub struct InsufficientDataError {
    pub teams: usize,
    pub rows: usize,
}

#[derive(Debug, Error)]
pub enum FitError {
    #[error("{0}")]
    InsufficientData(#[from] InsufficientDataError),

    #[error("{0}")]
    NonConvergence(#[from] SamplingNonConvergenceError),

    #[error("numerical failure: {0}")]
    Numerical(#[from] anyhow::Error),
}

/// Checks that a training window can support a fit, returning the window's team index.
pub fn check_sufficient(rows: &[MatchupRow]) -> Result<TeamIndex, InsufficientDataError> {
    let teams = TeamIndex::from_rows(rows);
    if teams.len() < 2 || rows.is_empty() {
        return Err(InsufficientDataError {
            teams: teams.len(),
            rows: rows.len(),
        });
    }
    Ok(teams)
}

/// Forecasts for a matchup, always from team A's perspective.
pub trait Forecast {
    /// Probability that team A beats team B.
    fn win_probability(&self, matchup: &Matchup) -> f64;

    /// Expected points margin of team A over team B, for families that model one.
    fn margin(&self, _matchup: &Matchup) -> Option<f64> {
        None
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Ordinal,
    EnumCount,
    EnumIter,
    Display,
    Serialize,
    Deserialize,
)]
pub enum ModelFamily {
    BayesMargin,
    BayesWin,
    EloClassic,
    EloHomeAdjusted,
    EloMarginScaled,
    Logistic,
    Forest,
    Heuristic,
}
impl ModelFamily {
    pub fn fit(
        &self,
        rows: &[MatchupRow],
        config: &ModelConfig,
        seed: u64,
    ) -> Result<FittedModel, FitError> {
        check_sufficient(rows)?;
        let fitted = match self {
            ModelFamily::BayesMargin => FittedModel::Bayes(Posterior::fit(
                Likelihood::Margin,
                rows,
                &config.margin_priors,
                &config.sampler,
                seed,
            )?),
            ModelFamily::BayesWin => FittedModel::Bayes(Posterior::fit(
                Likelihood::Win,
                rows,
                &config.win_priors,
                &config.sampler,
                seed,
            )?),
            ModelFamily::EloClassic => FittedModel::Rating(Ratings::fit(
                RatingVariant::Classic,
                config.rating.clone(),
                rows,
            )),
            ModelFamily::EloHomeAdjusted => FittedModel::Rating(Ratings::fit(
                RatingVariant::HomeAdjusted,
                config.rating.clone(),
                rows,
            )),
            ModelFamily::EloMarginScaled => FittedModel::Rating(Ratings::fit(
                RatingVariant::MarginScaled,
                config.rating.clone(),
                rows,
            )),
            ModelFamily::Logistic => {
                FittedModel::Logistic(LogisticModel::fit(rows, &config.logistic)?)
            }
            ModelFamily::Forest => FittedModel::Forest(Forest::fit(rows, &config.forest, seed)),
            ModelFamily::Heuristic => FittedModel::Heuristic(Heuristic),
        };
        Ok(fitted)
    }

    pub fn is_stochastic(&self) -> bool {
        matches!(
            self,
            ModelFamily::BayesMargin | ModelFamily::BayesWin | ModelFamily::Forest
        )
    }
}

#[derive(Debug, Clone)]
pub enum FittedModel {
    Bayes(Posterior),
    Rating(Ratings),
    Logistic(LogisticModel),
    Forest(Forest),
    Heuristic(Heuristic),
}

impl Forecast for FittedModel {
    fn win_probability(&self, matchup: &Matchup) -> f64 {
        match self {
            FittedModel::Bayes(posterior) => posterior.win_probability(matchup),
            FittedModel::Rating(ratings) => ratings.win_probability(matchup),
            FittedModel::Logistic(logistic) => logistic.win_probability(matchup),
            FittedModel::Forest(forest) => forest.win_probability(matchup),
            FittedModel::Heuristic(heuristic) => heuristic.win_probability(matchup),
        }
    }

    fn margin(&self, matchup: &Matchup) -> Option<f64> {
        match self {
            FittedModel::Bayes(posterior) => posterior.margin(matchup),
            FittedModel::Rating(ratings) => ratings.margin(matchup),
            FittedModel::Logistic(logistic) => logistic.margin(matchup),
            FittedModel::Forest(forest) => forest.margin(matchup),
            FittedModel::Heuristic(heuristic) => heuristic.margin(matchup),
        }
    }
}

/// The side picked to win a matchup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Pick {
    TeamA,
    TeamB,
}

/// Turns a probability into a pick; exactly 0.5 is settled by a fair coin.
pub fn decide(win_probability: f64, rand: &mut impl Rand) -> Pick {
    if win_probability > 0.5 {
        Pick::TeamA
    } else if win_probability < 0.5 {
        Pick::TeamB
    } else if random::coin_flip(rand) {
        Pick::TeamA
    } else {
        Pick::TeamB
    }
}

/// Settings for every family, so that any family can be fitted from one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub sampler: SamplerConfig,
    pub margin_priors: BayesPriors,
    pub win_priors: BayesPriors,
    pub rating: RatingConfig,
    pub logistic: LogisticConfig,
    pub forest: ForestConfig,
}
impl ModelConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.sampler.validate()?;
        self.margin_priors.validate()?;
        self.win_priors.validate()?;
        self.rating.validate()?;
        self.logistic.validate()?;
        self.forest.validate()?;
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            margin_priors: BayesPriors::margin(),
            win_priors: BayesPriors::win(),
            rating: RatingConfig::default(),
            logistic: LogisticConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}
