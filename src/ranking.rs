//! Posterior ranking by simulation against a generic opponent.
//!
//! The generic opponent has a strength drawn afresh for every simulated game from
//! `Normal(0, σ̄)`, where `σ̄` is the mean posterior standard deviation of team strength. Each team
//! plays it on neutral ground once per simulation, with the team's parameters taken from
//! successive posterior draws. The margin model yields a simulated points margin per game, and the
//! win model a simulated win or loss. Every team is simulated from the same random stream, so
//! teams with identical posteriors receive identical summaries.

use std::time::Instant;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::data::{Fixture, TeamId};
use crate::matchup::Matchup;
use crate::model::bayes::{Likelihood, Posterior};
use crate::random;
use crate::schedule::{Record, Schedule};
use crate::stats::{logistic, Moments, SliceExt};

/// Quantiles reported for simulated spreads.
pub const SPREAD_QUANTILES: [f64; 5] = [0.05, 0.25, 0.5, 0.75, 0.95];

#[derive(Debug, Error, PartialEq)]
pub enum RankingError {
    #[error("team {0} is not covered by the posterior")]
    UnknownTeam(TeamId),

    #[error("the margin and win posteriors cover different teams")]
    MismatchedRoster,

    #[error("the posterior holds no draws")]
    EmptyPosterior,

    #[error("at least one simulation is required")]
    NoSimulations,

    #[error("expected a {expected} posterior, got {actual}")]
    WrongLikelihood {
        expected: Likelihood,
        actual: Likelihood,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Simulated games per team (or per fixture).
    pub simulations: usize,
    pub seed: u64,
}
impl RankingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        const MIN_SIMULATIONS: usize = 2;
        if self.simulations < MIN_SIMULATIONS {
            bail!("number of simulations cannot be fewer than {MIN_SIMULATIONS}");
        }
        Ok(())
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            simulations: 20_000,
            seed: 0,
        }
    }
}

/// One team's simulated results against the generic opponent.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSimulation {
    pub team: TeamId,
    pub mean: f64,
    pub std_error: f64,
    /// 1-based; the highest mean ranks first.
    pub rank: usize,
}

/// Mean posterior standard deviation of strength across teams.
pub fn generic_opponent_stdev(posterior: &Posterior) -> f64 {
    let stdevs: Vec<_> = (0..posterior.teams().len())
        .map(|team| posterior.strength_stdev(team))
        .collect();
    if stdevs.is_empty() {
        0.0
    } else {
        stdevs.mean()
    }
}

/// 1-based ranks by descending value. Equal values keep their input order.
pub fn assign_ranks(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<_> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    let mut ranks = vec![0; values.len()];
    for (position, index) in order.into_iter().enumerate() {
        ranks[index] = position + 1;
    }
    ranks
}

/// Simulates every team in the posterior against the generic opponent, in team index order.
pub fn simulate_generic(
    posterior: &Posterior,
    config: &RankingConfig,
) -> Result<Vec<TeamSimulation>, RankingError> {
    let draws = posterior.num_draws();
    if draws == 0 {
        return Err(RankingError::EmptyPosterior);
    }
    if config.simulations == 0 {
        return Err(RankingError::NoSimulations);
    }
    let start = Instant::now();
    let opponent_stdev = generic_opponent_stdev(posterior);
    let mut summaries = Vec::with_capacity(posterior.teams().len());
    for team in 0..posterior.teams().len() {
        let mut rand = random::seeded(config.seed);
        let mut moments = Moments::default();
        for simulation in 0..config.simulations {
            let draw = simulation % draws;
            let opponent = random::next_normal(&mut rand, 0.0, opponent_stdev);
            let eta = posterior.noise(draw) + posterior.strength(draw, team) - opponent;
            let outcome = match posterior.sigma(draw) {
                Some(sigma) => random::next_normal(&mut rand, eta, sigma),
                None => random::next_bernoulli(&mut rand, logistic(eta)),
            };
            moments.push(outcome);
        }
        summaries.push((moments.mean(), moments.std_error()));
    }

    let means: Vec<_> = summaries.iter().map(|(mean, _)| *mean).collect();
    let ranks = assign_ranks(&means);
    debug!(
        "simulated {} teams × {} games against a generic opponent (σ̄ = {opponent_stdev:.3}) under the {} model in {:?}",
        summaries.len(),
        config.simulations,
        posterior.likelihood(),
        start.elapsed()
    );
    Ok(summaries
        .into_iter()
        .zip(ranks)
        .enumerate()
        .map(|(team, ((mean, std_error), rank))| TeamSimulation {
            team: posterior.teams().id(team),
            mean,
            std_error,
            rank,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedTeam {
    pub team: TeamId,
    pub name: String,
    pub record: Record,
    pub margin: TeamSimulation,
    pub win: TeamSimulation,
    /// Margin rank less win rank; positive when the team wins more than its margins suggest.
    pub luck: i64,
    pub luck_rank: usize,
    /// Mean of the margin and win ranks. Orders the table but is not itself a ranking.
    pub combined_rank: f64,
}

/// Ranks every team under both models and joins the results with the final standings, in display
/// order (ascending combined rank, ties in team order).
pub fn rank(
    schedule: &Schedule,
    margin: &Posterior,
    win: &Posterior,
    config: &RankingConfig,
) -> Result<Vec<RankedTeam>, RankingError> {
    check_likelihood(margin, Likelihood::Margin)?;
    check_likelihood(win, Likelihood::Win)?;
    if margin.teams().ids() != win.teams().ids() {
        return Err(RankingError::MismatchedRoster);
    }
    let margin_sims = simulate_generic(margin, config)?;
    let win_sims = simulate_generic(win, config)?;

    let lucks: Vec<_> = margin_sims
        .iter()
        .zip(&win_sims)
        .map(|(margin, win)| margin.rank as i64 - win.rank as i64)
        .collect();
    let luck_ranks = assign_ranks(&lucks.iter().map(|&luck| luck as f64).collect::<Vec<_>>());

    let mut table = Vec::with_capacity(margin_sims.len());
    for (((margin, win), luck), luck_rank) in margin_sims
        .into_iter()
        .zip(win_sims)
        .zip(lucks)
        .zip(luck_ranks)
    {
        let team = schedule
            .team(margin.team)
            .ok_or(RankingError::UnknownTeam(margin.team))?;
        let record = schedule
            .standings()
            .get(&margin.team)
            .copied()
            .unwrap_or_default();
        table.push(RankedTeam {
            team: margin.team,
            name: team.name.clone(),
            record,
            combined_rank: (margin.rank + win.rank) as f64 / 2.0,
            margin,
            win,
            luck,
            luck_rank,
        });
    }
    table.sort_by(|a, b| a.combined_rank.total_cmp(&b.combined_rank));
    Ok(table)
}

fn check_likelihood(posterior: &Posterior, expected: Likelihood) -> Result<(), RankingError> {
    if posterior.likelihood() != expected {
        return Err(RankingError::WrongLikelihood {
            expected,
            actual: posterior.likelihood(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpreadSummary {
    /// Simulated margins of the home team over the visitor.
    pub samples: Vec<f64>,
    pub mean: f64,
    pub std_error: f64,
    /// `(q, value)` for each of [`SPREAD_QUANTILES`].
    pub quantiles: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchupSimulation {
    pub fixture: Fixture,
    pub win_probability: f64,
    pub win_std_error: f64,
    pub spread: SpreadSummary,
}

/// Simulates a fixture between two real teams: the win model gives the home team's win
/// probability and the margin model its points spread.
pub fn simulate_matchup(
    margin: &Posterior,
    win: &Posterior,
    fixture: &Fixture,
    config: &RankingConfig,
) -> Result<MatchupSimulation, RankingError> {
    check_likelihood(margin, Likelihood::Margin)?;
    check_likelihood(win, Likelihood::Win)?;
    if config.simulations == 0 {
        return Err(RankingError::NoSimulations);
    }
    for posterior in [margin, win] {
        if posterior.num_draws() == 0 {
            return Err(RankingError::EmptyPosterior);
        }
        for team in [fixture.home, fixture.visitor] {
            if posterior.teams().position(team).is_none() {
                return Err(RankingError::UnknownTeam(team));
            }
        }
    }

    let matchup = Matchup {
        team_a: fixture.home,
        team_b: fixture.visitor,
        site: fixture.site,
        record_a: Record::default(),
        record_b: Record::default(),
    };
    let mut rand = random::seeded(config.seed);
    let mut wins = Moments::default();
    let mut samples = Vec::with_capacity(config.simulations);
    for simulation in 0..config.simulations {
        let draw = simulation % margin.num_draws();
        let eta = margin.linear_predictor(draw, &matchup);
        let sigma = margin.sigma(draw).unwrap_or(1.0);
        samples.push(random::next_normal(&mut rand, eta, sigma));

        let draw = simulation % win.num_draws();
        let eta = win.linear_predictor(draw, &matchup);
        wins.push(random::next_bernoulli(&mut rand, logistic(eta)));
    }
    let quantiles = SPREAD_QUANTILES
        .iter()
        .map(|&q| (q, samples.quantile(q)))
        .collect();
    Ok(MatchupSimulation {
        fixture: fixture.clone(),
        win_probability: wins.mean(),
        win_std_error: wins.std_error(),
        spread: SpreadSummary {
            mean: samples.mean(),
            std_error: samples.std_error(),
            quantiles,
            samples,
        },
    })
}

#[cfg(test)]
mod tests;
