//! Rolling-origin evaluation of the candidate families.
//!
//! For each cutoff week `w`, every family is fitted to the rows of weeks `≤ w` and forecasts the
//! rows of week `w + 1`. Each (window, family) pair is an independent unit of work that reads only
//! its own window's rows, so units run on a rayon pool of `parallelism` workers without sharing
//! mutable state. Outcomes are collected in unit order and every unit derives its own seeds, so the
//! report does not depend on the pool size. A family that fails to fit on a window is recorded as
//! a failure for that window alone; its forecasts for the window are left empty and the remaining
//! units carry on.

use std::fmt::{Display, Formatter};
use std::time::Instant;

use anyhow::bail;
use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::TeamId;
use crate::matchup::{MatchupRow, RowKey};
use crate::model::{decide, FitError, Forecast, ModelConfig, ModelFamily, Pick};
use crate::random;
use crate::schedule::Schedule;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("cutoffs must be strictly increasing: {previous} is followed by {next}")]
    NonIncreasingCutoffs { previous: u32, next: u32 },

    #[error("invalid backtest config: {0}")]
    Config(#[from] anyhow::Error),

    #[error("could not start the worker pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// The immutable view of time given to one unit of work: train on weeks up to and including
/// `cutoff`, forecast week `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BacktestWindow {
    pub cutoff: u32,
    pub target: u32,
}
impl BacktestWindow {
    pub fn new(cutoff: u32) -> Self {
        Self {
            cutoff,
            target: cutoff + 1,
        }
    }

    /// Splits rows into those visible for training and those to forecast.
    pub fn partition(&self, schedule: &Schedule) -> (Vec<MatchupRow>, Vec<MatchupRow>) {
        let training = schedule
            .training_rows()
            .iter()
            .filter(|row| row.week <= self.cutoff)
            .cloned()
            .collect();
        let prediction = schedule
            .prediction_rows()
            .iter()
            .filter(|row| row.week == self.target)
            .cloned()
            .collect();
        (training, prediction)
    }
}

impl Display for BacktestWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "weeks ≤ {} → {}", self.cutoff, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Cutoff weeks; empty means every week but the last.
    pub cutoffs: Vec<u32>,
    pub families: Vec<ModelFamily>,
    pub seed: u64,
    /// Maximum number of units fitted concurrently.
    pub parallelism: usize,
    pub models: ModelConfig,
}
impl BacktestConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.families.is_empty() {
            bail!("at least one model family is required");
        }
        if self.parallelism == 0 {
            bail!("parallelism must be positive");
        }
        self.models.validate()?;
        Ok(())
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            cutoffs: vec![],
            families: ModelFamily::iter().collect(),
            seed: 0,
            parallelism: 4,
            models: ModelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub win_probability: f64,
    pub margin: Option<f64>,
    pub pick: Pick,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub window: BacktestWindow,
    pub family: ModelFamily,
    pub row: RowKey,
    pub team_a: TeamId,
    pub team_b: TeamId,
    /// Realised outcome for team A: 1, 0 or 0.5.
    pub outcome: f64,
    /// Absent when the family could not be fitted on the window.
    pub forecast: Option<Prediction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFailure {
    pub window: BacktestWindow,
    pub family: ModelFamily,
    pub reason: String,
}

/// The row keys that made up a window, independent of any fitted values.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSummary {
    pub window: BacktestWindow,
    pub training: Vec<RowKey>,
    pub prediction: Vec<RowKey>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestReport {
    pub partitions: Vec<PartitionSummary>,
    pub predictions: Vec<PredictionRecord>,
    pub failures: Vec<FitFailure>,
}

/// Resolves the configured cutoffs against the schedule, checking that they strictly increase.
pub fn resolve_cutoffs(schedule: &Schedule, cutoffs: &[u32]) -> Result<Vec<u32>, BacktestError> {
    if cutoffs.is_empty() {
        let mut weeks = schedule.weeks();
        weeks.pop();
        return Ok(weeks);
    }
    for pair in cutoffs.windows(2) {
        if pair[1] <= pair[0] {
            return Err(BacktestError::NonIncreasingCutoffs {
                previous: pair[0],
                next: pair[1],
            });
        }
    }
    Ok(cutoffs.to_vec())
}

struct Window {
    window: BacktestWindow,
    training: Vec<MatchupRow>,
    prediction: Vec<MatchupRow>,
}

struct Unit<'a> {
    window: &'a Window,
    family: ModelFamily,
    seed: u64,
}

struct UnitOutcome {
    records: Vec<PredictionRecord>,
    failure: Option<FitFailure>,
}

pub fn run(schedule: &Schedule, config: &BacktestConfig) -> Result<BacktestReport, BacktestError> {
    config.validate()?;
    let start = Instant::now();
    let cutoffs = resolve_cutoffs(schedule, &config.cutoffs)?;

    let mut windows = Vec::with_capacity(cutoffs.len());
    for cutoff in cutoffs {
        let window = BacktestWindow::new(cutoff);
        let (training, prediction) = window.partition(schedule);
        if prediction.is_empty() {
            debug!("skipping window {window}: nothing to forecast");
            continue;
        }
        info!(
            "window {window}: {} training rows, {} rows to forecast",
            training.len(),
            prediction.len()
        );
        windows.push(Window {
            window,
            training,
            prediction,
        });
    }

    let units: Vec<_> = windows
        .iter()
        .flat_map(|window| {
            config.families.iter().map(move |&family| Unit {
                window,
                family,
                seed: random::derive_seed(
                    random::derive_seed(config.seed, window.window.cutoff as u64),
                    family.ordinal() as u64,
                ),
            })
        })
        .collect();

    let mut report = BacktestReport {
        partitions: windows
            .iter()
            .map(|window| PartitionSummary {
                window: window.window,
                training: window.training.iter().map(MatchupRow::key).collect(),
                prediction: window.prediction.iter().map(MatchupRow::key).collect(),
            })
            .collect(),
        ..BacktestReport::default()
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.parallelism)
        .build()?;
    let outcomes: Vec<_> = pool.install(|| {
        units
            .par_iter()
            .map(|unit| run_unit(unit, &config.models))
            .collect()
    });
    for outcome in outcomes {
        report.predictions.extend(outcome.records);
        report.failures.extend(outcome.failure);
    }
    info!(
        "backtest of {} windows × {} families took {:.3}s; {} predictions, {} failures",
        windows.len(),
        config.families.len(),
        start.elapsed().as_millis() as f64 / 1_000.,
        report.predictions.len(),
        report.failures.len()
    );
    Ok(report)
}

fn run_unit(unit: &Unit, models: &ModelConfig) -> UnitOutcome {
    let Unit {
        window,
        family,
        seed,
    } = unit;
    let start = Instant::now();
    let fitted = family.fit(&window.training, models, random::derive_seed(*seed, 0));
    let mut rand = random::seeded(random::derive_seed(*seed, 1));
    let (forecaster, failure) = match fitted {
        Ok(fitted) => (Some(fitted), None),
        Err(err) => {
            warn!("{family} could not be fitted on {}: {err}", window.window);
            let reason = match &err {
                FitError::Numerical(inner) => format!("{inner:#}"),
                _ => err.to_string(),
            };
            let failure = FitFailure {
                window: window.window,
                family: *family,
                reason,
            };
            (None, Some(failure))
        }
    };

    let records = window
        .prediction
        .iter()
        .map(|row| {
            let forecast = forecaster.as_ref().map(|fitted| {
                let win_probability = fitted.win_probability(&row.matchup);
                Prediction {
                    win_probability,
                    margin: fitted.margin(&row.matchup),
                    pick: decide(win_probability, &mut rand),
                }
            });
            PredictionRecord {
                window: window.window,
                family: *family,
                row: row.key(),
                team_a: row.matchup.team_a,
                team_b: row.matchup.team_b,
                outcome: row.outcome,
                forecast,
            }
        })
        .collect();
    debug!("{family} on {} took {:?}", window.window, start.elapsed());
    UnitOutcome { records, failure }
}
