use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, bail};
use clap::Parser;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use leaguecast::config::Config;
use leaguecast::data::Season;
use leaguecast::model::bayes::{Likelihood, Posterior};
use leaguecast::model::ModelFamily;
use leaguecast::ranking::RankingConfig;
use leaguecast::schedule::Schedule;
use leaguecast::{backtest, print, random, ranking, score};

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// season JSON file (teams, games and optional fixtures)
    season: PathBuf,

    /// JSON config file; defaults apply to anything omitted
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// comma-separated backtest cutoff weeks
    #[clap(long, value_delimiter = ',')]
    cutoffs: Option<Vec<u32>>,

    /// comma-separated model families to backtest
    #[clap(long, value_delimiter = ',', value_parser = parse_family)]
    families: Option<Vec<ModelFamily>>,

    /// root seed for both the backtest and the ranking
    #[clap(short = 's', long)]
    seed: Option<u64>,

    /// skip the backtest and only rank
    #[clap(long)]
    no_backtest: bool,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if let Some(families) = &self.families {
            if families.is_empty() {
                bail!("at least one model family must be specified");
            }
        }
        Ok(())
    }
}

fn parse_family(s: &str) -> anyhow::Result<ModelFamily> {
    ModelFamily::iter()
        .find(|family| family.to_string().eq_ignore_ascii_case(s))
        .ok_or_else(|| anyhow!("unsupported model family {s}"))
}

fn main() -> Result<(), Box<dyn Error>> {
    if env::var("RUST_BACKTRACE").is_err() {
        env::set_var("RUST_BACKTRACE", "full")
    }
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    args.validate()?;
    debug!("args: {args:?}");

    let mut config = match &args.config {
        Some(path) => Config::read_json_file(path)?,
        None => Config::default(),
    };
    if let Some(cutoffs) = &args.cutoffs {
        config.backtest.cutoffs = cutoffs.clone();
    }
    if let Some(families) = &args.families {
        config.backtest.families = families.clone();
    }
    if let Some(seed) = args.seed {
        config.backtest.seed = seed;
        config.ranking.seed = seed;
    }
    config.validate()?;
    debug!("config: {config:?}");

    let start_time = Instant::now();
    let Season {
        teams,
        games,
        fixtures,
    } = Season::read_json_file(&args.season)?;
    let schedule = Schedule::build(teams, games)?;
    info!(
        "loaded {} teams, {} games over {} weeks",
        schedule.teams().len(),
        schedule.games().len(),
        schedule.weeks().len()
    );

    if !args.no_backtest {
        let report = backtest::run(&schedule, &config.backtest)?;
        let summary = score::summarise(&report);
        info!(
            "backtest accuracy:\n{}",
            Console::default().render(&print::tabulate_accuracy(&summary))
        );
        if !summary.failures.is_empty() {
            info!(
                "fit failures:\n{}",
                Console::default().render(&print::tabulate_failures(&summary))
            );
        }
    }

    let rows = schedule.training_rows();
    let models = &config.backtest.models;
    let margin = Posterior::fit(
        Likelihood::Margin,
        rows,
        &models.margin_priors,
        &models.sampler,
        random::derive_seed(config.ranking.seed, 0),
    )?;
    let win = Posterior::fit(
        Likelihood::Win,
        rows,
        &models.win_priors,
        &models.sampler,
        random::derive_seed(config.ranking.seed, 1),
    )?;
    let ranked = ranking::rank(&schedule, &margin, &win, &config.ranking)?;
    info!(
        "posterior ranking:\n{}",
        Console::default().render(&print::tabulate_ranking(&ranked))
    );

    if !fixtures.is_empty() {
        let mut matchups = Vec::with_capacity(fixtures.len());
        for (index, fixture) in fixtures.iter().enumerate() {
            let fixture_config = RankingConfig {
                seed: random::derive_seed(config.ranking.seed, index as u64 + 2),
                ..config.ranking.clone()
            };
            matchups.push(ranking::simulate_matchup(
                &margin,
                &win,
                fixture,
                &fixture_config,
            )?);
        }
        info!(
            "fixtures:\n{}",
            Console::default().render(&print::tabulate_matchups(&schedule, &matchups))
        );
    }

    let elapsed = start_time.elapsed();
    info!("completed in {}s", elapsed.as_millis() as f64 / 1_000.);
    Ok(())
}
