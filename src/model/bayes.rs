//! Hierarchical Bayesian team-strength models.
//!
//! Both likelihoods share one linear predictor, `η = noise + strength_A − strength_B + home·site`.
//! The margin model treats the score margin as `Normal(η, σ)`; the win model treats the outcome as
//! `Bernoulli(logistic(η))`. Team strengths are exchangeable draws from `Normal(0, τ)`, where the
//! spread `τ` is itself estimated under a half-normal hyperprior, so that teams with little data
//! are pooled toward the league. The noise intercept and the home effect have zero-centred normal
//! priors, and σ a half-normal prior. Each game contributes one unit of likelihood however many
//! mirrored or tie-split rows represent it. The joint posterior is approximated by
//! [`sampler::sample`].

use std::time::Instant;

use anyhow::bail;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use strum_macros::Display;
use tracing::debug;

use crate::data::TeamId;
use crate::linear::matrix::Matrix;
use crate::matchup::{Matchup, MatchupRow, TeamIndex};
use crate::model::sampler::{BlockMove, Diagnostics, LogDensity, SamplerConfig};
use crate::model::{check_sufficient, sampler, FitError, Forecast};
use crate::stats::{bernoulli_logit_ln, logistic, SliceExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Likelihood {
    Margin,
    Win,
}
impl Likelihood {
    /// Parameters of a model over `teams` teams.
    pub fn dim(&self, teams: usize) -> usize {
        match self {
            Likelihood::Margin => teams + 4,
            Likelihood::Win => teams + 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesPriors {
    /// Scale of the half-normal hyperprior on the spread of team strengths.
    pub strength_scale: f64,
    pub noise_sd: f64,
    pub home_sd: f64,
    /// Scale of the half-normal prior on the margin σ. Unused by the win likelihood.
    pub sigma_scale: f64,
}
impl BayesPriors {
    /// Weakly informative priors on the points scale.
    pub fn margin() -> Self {
        Self {
            strength_scale: 10.0,
            noise_sd: 5.0,
            home_sd: 5.0,
            sigma_scale: 20.0,
        }
    }

    /// Weakly informative priors on the logit scale.
    pub fn win() -> Self {
        Self {
            strength_scale: 1.5,
            noise_sd: 1.0,
            home_sd: 1.0,
            sigma_scale: 1.0,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (name, value) in [
            ("strength", self.strength_scale),
            ("noise", self.noise_sd),
            ("home", self.home_sd),
            ("sigma", self.sigma_scale),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                bail!("{name} prior scale must be positive and finite");
            }
        }
        Ok(())
    }
}

struct Observation {
    team_a: usize,
    team_b: usize,
    site: f64,
    value: f64,
    /// Share of its game's likelihood carried by this row.
    weight: f64,
}

/// Parameter layout: `[strength₀ … strengthₙ₋₁, noise, home, ln τ, ln σ]`, the last only present
/// under the margin likelihood.
struct Hierarchical<'a> {
    likelihood: Likelihood,
    priors: &'a BayesPriors,
    teams: &'a TeamIndex,
    observations: Vec<Observation>,
    /// Observations involving each team, by team position.
    adjacency: Vec<Vec<usize>>,
    init_log_sigma: f64,
}
impl<'a> Hierarchical<'a> {
    fn new(
        likelihood: Likelihood,
        priors: &'a BayesPriors,
        teams: &'a TeamIndex,
        rows: &[MatchupRow],
    ) -> Self {
        let mut rows_per_game = FxHashMap::default();
        for row in rows {
            *rows_per_game.entry(row.game).or_insert(0usize) += 1;
        }
        let mut observations = Vec::with_capacity(rows.len());
        let mut adjacency = vec![vec![]; teams.len()];
        for row in rows {
            let (Some(team_a), Some(team_b)) = (
                teams.position(row.matchup.team_a),
                teams.position(row.matchup.team_b),
            ) else {
                continue;
            };
            adjacency[team_a].push(observations.len());
            adjacency[team_b].push(observations.len());
            observations.push(Observation {
                team_a,
                team_b,
                site: row.matchup.site.indicator(),
                value: match likelihood {
                    Likelihood::Margin => row.margin,
                    Likelihood::Win => row.outcome,
                },
                weight: rows_per_game
                    .get(&row.game)
                    .map_or(1.0, |&count| 1.0 / count as f64),
            });
        }
        let margins: Vec<_> = observations.iter().map(|obs| obs.value).collect();
        let init_log_sigma = if margins.len() > 1 {
            margins.stdev().max(1.0).ln()
        } else {
            0.0
        };
        Self {
            likelihood,
            priors,
            teams,
            observations,
            adjacency,
            init_log_sigma,
        }
    }

    fn noise(&self) -> usize {
        self.teams.len()
    }

    fn home(&self) -> usize {
        self.teams.len() + 1
    }

    fn log_scale(&self) -> usize {
        self.teams.len() + 2
    }

    fn log_sigma(&self) -> usize {
        self.teams.len() + 3
    }

    #[inline]
    fn observation_ln(&self, params: &[f64], obs: &Observation) -> f64 {
        let eta = params[self.noise()] + params[obs.team_a] - params[obs.team_b]
            + params[self.home()] * obs.site;
        let ln = match self.likelihood {
            Likelihood::Margin => {
                let log_sigma = params[self.log_sigma()];
                let z = (obs.value - eta) / log_sigma.exp();
                -log_sigma - 0.5 * z * z
            }
            Likelihood::Win => bernoulli_logit_ln(obs.value, eta),
        };
        obs.weight * ln
    }

    /// Prior of the strengths given the spread `τ`, with its normalising term.
    fn strengths_ln(&self, params: &[f64]) -> f64 {
        let log_scale = params[self.log_scale()];
        let scale = log_scale.exp();
        params[..self.teams.len()]
            .iter()
            .map(|&strength| normal_ln(strength, scale) - log_scale)
            .sum()
    }

    /// Half-normal prior on `e^value`, sampled as `value` with its Jacobian.
    fn half_normal_ln(value: f64, scale: f64) -> f64 {
        normal_ln(value.exp(), scale) + value
    }
}

#[inline]
fn normal_ln(x: f64, stdev: f64) -> f64 {
    let z = x / stdev;
    -0.5 * z * z
}

impl LogDensity for Hierarchical<'_> {
    fn dim(&self) -> usize {
        self.likelihood.dim(self.teams.len())
    }

    fn initial(&self, param: usize) -> f64 {
        if param == self.log_scale() {
            (self.priors.strength_scale / 2.0).ln()
        } else if self.likelihood == Likelihood::Margin && param == self.log_sigma() {
            self.init_log_sigma
        } else {
            0.0
        }
    }

    fn conditional(&self, params: &[f64], param: usize) -> f64 {
        let value = params[param];
        if param < self.teams.len() {
            let prior = normal_ln(value, params[self.log_scale()].exp());
            return self.adjacency[param].iter().fold(prior, |acc, &index| {
                acc + self.observation_ln(params, &self.observations[index])
            });
        }
        if param == self.log_scale() {
            return self.strengths_ln(params)
                + Self::half_normal_ln(value, self.priors.strength_scale);
        }

        let prior = if param == self.noise() {
            normal_ln(value, self.priors.noise_sd)
        } else if param == self.home() {
            normal_ln(value, self.priors.home_sd)
        } else {
            Self::half_normal_ln(value, self.priors.sigma_scale)
        };
        self.observations
            .iter()
            .fold(prior, |acc, obs| acc + self.observation_ln(params, obs))
    }

    fn joint(&self, params: &[f64]) -> f64 {
        let mut prior = self.strengths_ln(params)
            + Self::half_normal_ln(params[self.log_scale()], self.priors.strength_scale)
            + normal_ln(params[self.noise()], self.priors.noise_sd)
            + normal_ln(params[self.home()], self.priors.home_sd);
        if self.likelihood == Likelihood::Margin {
            prior += Self::half_normal_ln(params[self.log_sigma()], self.priors.sigma_scale);
        }
        self.observations
            .iter()
            .fold(prior, |acc, obs| acc + self.observation_ln(params, obs))
    }

    /// Strengths are identified only through their differences and the prior, so a common shift
    /// is proposed jointly; the strengths are also rescaled together with their spread.
    fn block_moves(&self) -> Vec<BlockMove> {
        let strengths = 0..self.teams.len();
        vec![
            BlockMove::Translate(strengths.clone()),
            BlockMove::Dilate {
                params: strengths,
                log_scale: self.log_scale(),
            },
        ]
    }

    fn describe(&self, param: usize) -> String {
        if param < self.teams.len() {
            format!("strength[{}]", self.teams.id(param))
        } else if param == self.noise() {
            "noise".into()
        } else if param == self.home() {
            "home".into()
        } else if param == self.log_scale() {
            "tau".into()
        } else {
            "sigma".into()
        }
    }
}

/// Posterior draws of a hierarchical model over the teams seen in training.
#[derive(Debug, Clone)]
pub struct Posterior {
    likelihood: Likelihood,
    teams: TeamIndex,
    samples: Matrix<f64>,
    diagnostics: Option<Diagnostics>,
    standard_normal: Normal,
}
impl Posterior {
    pub fn fit(
        likelihood: Likelihood,
        rows: &[MatchupRow],
        priors: &BayesPriors,
        config: &SamplerConfig,
        seed: u64,
    ) -> Result<Self, FitError> {
        let start = Instant::now();
        let teams = check_sufficient(rows)?;
        let target = Hierarchical::new(likelihood, priors, &teams, rows);
        let draws = sampler::sample(&target, config, seed)?;
        debug!(
            "fitted {likelihood} model over {} teams and {} rows in {:?}",
            teams.len(),
            rows.len(),
            start.elapsed()
        );
        Ok(Self {
            likelihood,
            teams,
            samples: draws.samples,
            diagnostics: Some(draws.diagnostics),
            standard_normal: standard_normal()?,
        })
    }

    /// Assembles a posterior from externally obtained draws laid out as
    /// `[strengths…, noise, home, ln τ]`, plus `ln σ` under the margin likelihood.
    pub fn from_draws(
        likelihood: Likelihood,
        teams: TeamIndex,
        samples: Matrix<f64>,
    ) -> Result<Self, anyhow::Error> {
        let expected = likelihood.dim(teams.len());
        if samples.cols() != expected {
            bail!(
                "{} columns do not match the {expected} parameters of a {likelihood} model over {} teams",
                samples.cols(),
                teams.len()
            );
        }
        Ok(Self {
            likelihood,
            teams,
            samples,
            diagnostics: None,
            standard_normal: standard_normal()?,
        })
    }

    pub fn likelihood(&self) -> Likelihood {
        self.likelihood
    }

    pub fn teams(&self) -> &TeamIndex {
        &self.teams
    }

    pub fn num_draws(&self) -> usize {
        self.samples.rows()
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        self.diagnostics.as_ref()
    }

    #[inline]
    pub fn strength(&self, draw: usize, team: usize) -> f64 {
        self.samples[(draw, team)]
    }

    /// Strength of a team by identifier; teams absent from training take the prior mean.
    #[inline]
    pub fn strength_of(&self, draw: usize, team: TeamId) -> f64 {
        self.teams
            .position(team)
            .map_or(0.0, |position| self.strength(draw, position))
    }

    #[inline]
    pub fn noise(&self, draw: usize) -> f64 {
        self.samples[(draw, self.teams.len())]
    }

    #[inline]
    pub fn home(&self, draw: usize) -> f64 {
        self.samples[(draw, self.teams.len() + 1)]
    }

    /// Spread of team strengths about the league average.
    #[inline]
    pub fn scale(&self, draw: usize) -> f64 {
        self.samples[(draw, self.teams.len() + 2)].exp()
    }

    /// Residual standard deviation of the margin likelihood.
    #[inline]
    pub fn sigma(&self, draw: usize) -> Option<f64> {
        match self.likelihood {
            Likelihood::Margin => Some(self.samples[(draw, self.teams.len() + 3)].exp()),
            Likelihood::Win => None,
        }
    }

    pub fn strength_mean(&self, team: usize) -> f64 {
        self.samples.column_vec(team).mean()
    }

    pub fn strength_stdev(&self, team: usize) -> f64 {
        self.samples.column_vec(team).stdev()
    }

    #[inline]
    pub fn linear_predictor(&self, draw: usize, matchup: &Matchup) -> f64 {
        self.noise(draw) + self.strength_of(draw, matchup.team_a)
            - self.strength_of(draw, matchup.team_b)
            + self.home(draw) * matchup.site.indicator()
    }
}

fn standard_normal() -> Result<Normal, anyhow::Error> {
    Ok(Normal::new(0.0, 1.0)?)
}

impl Forecast for Posterior {
    /// Posterior predictive probability that team A outscores team B.
    fn win_probability(&self, matchup: &Matchup) -> f64 {
        let draws = self.num_draws();
        if draws == 0 {
            return 0.5;
        }
        let total: f64 = (0..draws)
            .map(|draw| {
                let eta = self.linear_predictor(draw, matchup);
                match self.sigma(draw) {
                    Some(sigma) => self.standard_normal.cdf(eta / sigma),
                    None => logistic(eta),
                }
            })
            .sum();
        total / draws as f64
    }

    fn margin(&self, matchup: &Matchup) -> Option<f64> {
        match self.likelihood {
            Likelihood::Margin if self.num_draws() > 0 => {
                let total: f64 = (0..self.num_draws())
                    .map(|draw| self.linear_predictor(draw, matchup))
                    .sum();
                Some(total / self.num_draws() as f64)
            }
            _ => None,
        }
    }
}
