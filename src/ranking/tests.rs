use assert_float_eq::*;

use crate::data::Site;
use crate::linear::matrix::Matrix;
use crate::matchup::TeamIndex;
use crate::model::bayes::BayesPriors;
use crate::model::sampler::SamplerConfig;
use crate::testing::{four_team_games, four_teams};

use super::*;

fn posterior(likelihood: Likelihood, ids: &[u32], draws: &[Vec<f64>]) -> Posterior {
    let teams = TeamIndex::from_ids(ids.iter().map(|&id| TeamId(id)));
    let mut samples = Matrix::with_cols(draws.first().map_or(0, Vec::len));
    for draw in draws {
        samples.push_row(draw);
    }
    Posterior::from_draws(likelihood, teams, samples).unwrap()
}

/// Every team shares the same strength draws; noise, home and ln τ are zero and σ = 7.
fn identical(likelihood: Likelihood, ids: &[u32]) -> Posterior {
    let draws: Vec<_> = (0..50)
        .map(|draw| {
            let strength = if draw % 2 == 0 { 0.5 } else { -0.5 };
            let mut row = vec![strength; ids.len()];
            row.extend([0.0, 0.0, 0.0]);
            if likelihood == Likelihood::Margin {
                row.push(7f64.ln());
            }
            row
        })
        .collect();
    posterior(likelihood, ids, &draws)
}

fn schedule() -> Schedule {
    Schedule::build(four_teams(), four_team_games()).unwrap()
}

fn config() -> RankingConfig {
    RankingConfig {
        simulations: 5_000,
        seed: 21,
    }
}

#[test]
fn ranks_are_stable_on_ties() {
    assert_eq!(vec![3, 1, 2, 4], assign_ranks(&[1.0, 3.0, 3.0, 0.5]));
    assert_eq!(vec![1, 2, 3], assign_ranks(&[0.0, 0.0, 0.0]));
    assert!(assign_ranks(&[]).is_empty());
}

#[test]
fn generic_opponent_spread() {
    let draws = vec![
        vec![1.0, 0.0, 0.0, 0.0, 0.0],
        vec![3.0, 0.0, 0.0, 0.0, 0.0],
        vec![5.0, 0.0, 0.0, 0.0, 0.0],
    ];
    // strength stdevs are 2 and 0
    let posterior = posterior(Likelihood::Win, &[1, 2], &draws);
    assert_float_absolute_eq!(1.0, generic_opponent_stdev(&posterior), 1e-12);
}

#[test]
fn identical_posteriors_tie_in_team_order() {
    for likelihood in [Likelihood::Margin, Likelihood::Win] {
        let sims = simulate_generic(&identical(likelihood, &[1, 2, 3]), &config()).unwrap();
        assert_eq!(3, sims.len());
        for sim in &sims {
            assert_eq!(sims[0].mean, sim.mean);
            assert_eq!(sims[0].std_error, sim.std_error);
        }
        let ranks: Vec<_> = sims.iter().map(|sim| sim.rank).collect();
        assert_eq!(vec![1, 2, 3], ranks);
    }

    let table = rank(
        &schedule(),
        &identical(Likelihood::Margin, &[1, 2, 3]),
        &identical(Likelihood::Win, &[1, 2, 3]),
        &config(),
    )
    .unwrap();
    let order: Vec<_> = table.iter().map(|team| team.team).collect();
    assert_eq!(vec![TeamId(1), TeamId(2), TeamId(3)], order);
    assert!(table.iter().all(|team| team.luck == 0));
    assert_eq!(vec![1, 2, 3], table.iter().map(|team| team.luck_rank).collect::<Vec<_>>());
}

#[test]
fn generic_simulation_moments() {
    let sims = simulate_generic(&identical(Likelihood::Win, &[1]), &config()).unwrap();
    // symmetric strengths against a symmetric opponent
    assert_float_absolute_eq!(0.5, sims[0].mean, 0.03);
    assert_float_absolute_eq!((0.25f64 / 5_000.0).sqrt(), sims[0].std_error, 1e-3);
}

#[test]
fn upset_season_shows_close_game_luck() {
    let schedule = schedule();
    let rows = schedule.training_rows();
    let sampler = SamplerConfig::default();
    let margin =
        Posterior::fit(Likelihood::Margin, rows, &BayesPriors::margin(), &sampler, 1).unwrap();
    let win = Posterior::fit(Likelihood::Win, rows, &BayesPriors::win(), &sampler, 2).unwrap();
    let table = rank(&schedule, &margin, &win, &RankingConfig::default()).unwrap();

    assert_eq!(4, table.len());
    assert!(table.iter().any(|team| team.luck != 0));
    assert_eq!(0, table.iter().map(|team| team.luck).sum::<i64>());
    for pair in table.windows(2) {
        assert!(pair[0].combined_rank <= pair[1].combined_rank);
    }

    let by_id = |id: u32| table.iter().find(|team| team.team == TeamId(id)).unwrap();
    // Delta's single rout tops the margin view; Alpha's three one-point wins top the win view
    assert_eq!(1, by_id(4).margin.rank);
    assert_eq!(1, by_id(1).win.rank);
    assert!(by_id(4).luck < 0);
    assert!(by_id(1).luck > 0);
    assert_eq!("Alpha", by_id(1).name);
    assert_eq!(Record::new(3, 0), by_id(1).record);
    assert_eq!(4, by_id(3).win.rank);
}

#[test]
fn matchup_simulation() {
    let margin = posterior(
        Likelihood::Margin,
        &[1, 2],
        &[vec![5.0, -5.0, 0.0, 1.0, 0.0, 2f64.ln()]],
    );
    let win = posterior(Likelihood::Win, &[1, 2], &[vec![1.0, -1.0, 0.0, 0.0, 0.0]]);
    let fixture = Fixture {
        home: TeamId(1),
        visitor: TeamId(2),
        site: Site::Home,
    };
    let config = RankingConfig {
        simulations: 20_000,
        seed: 4,
    };
    let sim = simulate_matchup(&margin, &win, &fixture, &config).unwrap();

    assert_eq!(20_000, sim.spread.samples.len());
    assert_float_absolute_eq!(11.0, sim.spread.mean, 0.1);
    assert_float_absolute_eq!(2.0 / (20_000f64).sqrt(), sim.spread.std_error, 1e-3);
    assert_eq!(SPREAD_QUANTILES.len(), sim.spread.quantiles.len());
    assert_float_absolute_eq!(11.0, sim.spread.quantiles[2].1, 0.1);
    assert!(sim.spread.quantiles[0].1 < sim.spread.quantiles[4].1);

    assert_float_absolute_eq!(logistic(2.0), sim.win_probability, 0.02);
    assert!(sim.win_std_error > 0.0 && sim.win_std_error < 0.01);
}

#[test]
fn ranking_errors() {
    let margin = identical(Likelihood::Margin, &[1, 2]);
    let win = identical(Likelihood::Win, &[1, 3]);
    assert_eq!(
        RankingError::MismatchedRoster,
        rank(&schedule(), &margin, &win, &config()).unwrap_err()
    );
    assert_eq!(
        RankingError::WrongLikelihood {
            expected: Likelihood::Margin,
            actual: Likelihood::Win
        },
        rank(&schedule(), &win, &win, &config()).unwrap_err()
    );

    let fixture = Fixture {
        home: TeamId(1),
        visitor: TeamId(9),
        site: Site::Neutral,
    };
    let win = identical(Likelihood::Win, &[1, 2]);
    assert_eq!(
        RankingError::UnknownTeam(TeamId(9)),
        simulate_matchup(&margin, &win, &fixture, &config()).unwrap_err()
    );

    let empty = Posterior::from_draws(
        Likelihood::Win,
        TeamIndex::from_ids([TeamId(1)]),
        Matrix::with_cols(4),
    )
    .unwrap();
    assert_eq!(
        RankingError::EmptyPosterior,
        simulate_generic(&empty, &config()).unwrap_err()
    );
    assert_eq!(
        RankingError::NoSimulations,
        simulate_generic(
            &win,
            &RankingConfig {
                simulations: 0,
                seed: 0
            }
        )
        .unwrap_err()
    );

    let unlisted = identical(Likelihood::Margin, &[1, 7]);
    let unlisted_win = identical(Likelihood::Win, &[1, 7]);
    assert_eq!(
        RankingError::UnknownTeam(TeamId(7)),
        rank(&schedule(), &unlisted, &unlisted_win, &config()).unwrap_err()
    );
}

#[test]
fn validate() {
    assert!(RankingConfig::default().validate().is_ok());
    assert!(RankingConfig {
        simulations: 1,
        seed: 0
    }
    .validate()
    .is_err());
}
