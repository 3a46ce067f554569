use criterion::{criterion_group, criterion_main, Criterion};

use leaguecast::data::TeamId;
use leaguecast::linear::matrix::Matrix;
use leaguecast::matchup::TeamIndex;
use leaguecast::model::bayes::{Likelihood, Posterior};
use leaguecast::ranking::{simulate_generic, RankingConfig};

const TEAMS: usize = 32;
const DRAWS: usize = 4_000;

/// Draws in which team strengths are spread evenly around zero and jittered per draw.
fn synthetic_posterior(likelihood: Likelihood) -> Posterior {
    let teams = TeamIndex::from_ids((0..TEAMS as u32).map(TeamId));
    let mut samples = Matrix::with_cols(likelihood.dim(TEAMS));
    let mut row = vec![0.0; likelihood.dim(TEAMS)];
    for draw in 0..DRAWS {
        let jitter = (draw % 7) as f64 / 7.0 - 0.5;
        for (team, value) in row.iter_mut().take(TEAMS).enumerate() {
            *value = (team as f64 - TEAMS as f64 / 2.0) / 4.0 + jitter;
        }
        if likelihood == Likelihood::Margin {
            row[TEAMS + 3] = 12f64.ln();
        }
        samples.push_row(&row);
    }
    Posterior::from_draws(likelihood, teams, samples).unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let config = RankingConfig {
        simulations: 20_000,
        seed: 0,
    };
    let margin = synthetic_posterior(Likelihood::Margin);
    let win = synthetic_posterior(Likelihood::Win);

    // sanity check
    assert_eq!(TEAMS, simulate_generic(&win, &config).unwrap().len());

    c.bench_function("cri_simulate_margin", |b| {
        b.iter(|| simulate_generic(&margin, &config).unwrap());
    });

    c.bench_function("cri_simulate_win", |b| {
        b.iter(|| simulate_generic(&win, &config).unwrap());
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
