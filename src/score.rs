//! Scoring of backtest forecasts against realised outcomes.

use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};

use crate::backtest::{BacktestReport, FitFailure, PredictionRecord};
use crate::model::{ModelFamily, Pick};

/// Credit for forecasting `win_probability` when the realised outcome was `outcome`.
///
/// For a decisive outcome, full credit if the forecast is within 0.5 of it, half credit at exactly
/// 0.5 (a toss-up) and nothing otherwise. A tie is scored as the average over its two split
/// outcomes, which is half credit whatever the forecast.
pub fn correctness(outcome: f64, win_probability: f64) -> f64 {
    if outcome == 0.5 {
        return (correctness(0.0, win_probability) + correctness(1.0, win_probability)) / 2.0;
    }
    let distance = (outcome - win_probability).abs();
    if distance < 0.5 {
        1.0
    } else if distance == 0.5 {
        0.5
    } else {
        0.0
    }
}

/// Credit for a committed pick: 1 if the picked side won, 0 if it lost, and half credit on a tie.
pub fn pick_credit(outcome: f64, pick: Pick) -> f64 {
    match pick {
        Pick::TeamA => outcome,
        Pick::TeamB => 1.0 - outcome,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyAccuracy {
    pub family: ModelFamily,
    /// Sum of correctness over scored rows.
    pub correct: f64,
    /// Sum of pick credit over scored rows, with toss-ups settled by the forecast's coin.
    pub picked: f64,
    pub scored: usize,
    /// Rows with no forecast because the family failed to fit on their window.
    pub excluded: usize,
}
impl FamilyAccuracy {
    /// Mean correctness over scored rows; `None` if nothing was scored.
    pub fn accuracy(&self) -> Option<f64> {
        if self.scored == 0 {
            None
        } else {
            Some(self.correct / self.scored as f64)
        }
    }

    /// Mean pick credit over scored rows; `None` if nothing was scored.
    pub fn pick_accuracy(&self) -> Option<f64> {
        if self.scored == 0 {
            None
        } else {
            Some(self.picked / self.scored as f64)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccuracySummary {
    /// One entry per family that has at least one record, in family order.
    pub families: Vec<FamilyAccuracy>,
    pub failures: Vec<FitFailure>,
}
impl AccuracySummary {
    pub fn family(&self, family: ModelFamily) -> Option<&FamilyAccuracy> {
        self.families.iter().find(|accuracy| accuracy.family == family)
    }
}

/// Aggregates correctness per family. Missing forecasts count towards neither the numerator nor
/// the denominator.
pub fn score(predictions: &[PredictionRecord]) -> Vec<FamilyAccuracy> {
    let mut tallies: Vec<_> = ModelFamily::iter()
        .map(|family| FamilyAccuracy {
            family,
            correct: 0.0,
            picked: 0.0,
            scored: 0,
            excluded: 0,
        })
        .collect();
    let mut seen = [false; ModelFamily::COUNT];
    for record in predictions {
        let index = record.family.ordinal();
        seen[index] = true;
        let tally = &mut tallies[index];
        match &record.forecast {
            Some(forecast) => {
                tally.correct += correctness(record.outcome, forecast.win_probability);
                tally.picked += pick_credit(record.outcome, forecast.pick);
                tally.scored += 1;
            }
            None => tally.excluded += 1,
        }
    }
    tallies
        .into_iter()
        .filter(|tally| seen[tally.family.ordinal()])
        .collect()
}

pub fn summarise(report: &BacktestReport) -> AccuracySummary {
    AccuracySummary {
        families: score(&report.predictions),
        failures: report.failures.clone(),
    }
}
