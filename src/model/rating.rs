//! Incremental pairwise rating systems (Elo variants).
//!
//! Ratings start level and are updated after each training game, in sequence order, by
//! `K·(actual − expected)` where `expected = 1 / (1 + 10^(−diff / scale))`. The variants differ in
//! whether the home side's rating is shifted when computing `expected` and in whether `K` grows
//! with the winning margin.

use anyhow::bail;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::data::{outcome_of, TeamId};
use crate::matchup::{Matchup, MatchupRow};
use crate::model::Forecast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum RatingVariant {
    /// Fixed `K`, no home shift.
    Classic,
    /// Fixed `K`, home side's rating shifted by `home_advantage`.
    HomeAdjusted,
    /// `K` scaled by the log of the winning margin and damped by the winner's pre-game rating
    /// edge, with the home shift.
    MarginScaled,
}
impl RatingVariant {
    fn home_shift(&self) -> bool {
        !matches!(self, RatingVariant::Classic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub initial_rating: f64,
    pub k_factor: f64,
    pub home_advantage: f64,
    /// Rating difference at which the expected score is 10:1.
    pub scale: f64,
}
impl RatingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.k_factor > 0.0) {
            bail!("K-factor must be positive");
        }
        if !(self.scale > 0.0) {
            bail!("rating scale must be positive");
        }
        if !self.initial_rating.is_finite() || !self.home_advantage.is_finite() {
            bail!("initial rating and home advantage must be finite");
        }
        Ok(())
    }
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: 1_500.0,
            k_factor: 20.0,
            home_advantage: 65.0,
            scale: 400.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ratings {
    variant: RatingVariant,
    config: RatingConfig,
    ratings: FxHashMap<TeamId, f64>,
    games: usize,
}
impl Ratings {
    pub fn new(variant: RatingVariant, config: RatingConfig) -> Self {
        Self {
            variant,
            config,
            ratings: FxHashMap::default(),
            games: 0,
        }
    }

    /// Replays every game in `rows` once (from its canonical row), in sequence order.
    pub fn fit(variant: RatingVariant, config: RatingConfig, rows: &[MatchupRow]) -> Self {
        let mut canonical: Vec<_> = rows.iter().filter(|row| row.is_canonical()).collect();
        canonical.sort_by_key(|row| row.game);
        let mut ratings = Self::new(variant, config);
        for row in canonical {
            ratings.update(&row.matchup, row.margin);
        }
        ratings
    }

    pub fn variant(&self) -> RatingVariant {
        self.variant
    }

    /// Number of games applied.
    pub fn games(&self) -> usize {
        self.games
    }

    pub fn rating(&self, team: TeamId) -> f64 {
        self.ratings
            .get(&team)
            .copied()
            .unwrap_or(self.config.initial_rating)
    }

    /// Team A's rating less team B's, including any home shift.
    fn effective_diff(&self, matchup: &Matchup) -> f64 {
        let diff = self.rating(matchup.team_a) - self.rating(matchup.team_b);
        if self.variant.home_shift() {
            diff + self.config.home_advantage * matchup.site.indicator()
        } else {
            diff
        }
    }

    pub fn expected(&self, matchup: &Matchup) -> f64 {
        let diff = self.effective_diff(matchup);
        1.0 / (1.0 + 10f64.powf(-diff / self.config.scale))
    }

    /// Applies the result of one game, `margin` being team A's points less team B's.
    pub fn update(&mut self, matchup: &Matchup, margin: f64) {
        let expected = self.expected(matchup);
        let actual = outcome_of(margin);
        let k = match self.variant {
            RatingVariant::Classic | RatingVariant::HomeAdjusted => self.config.k_factor,
            RatingVariant::MarginScaled => {
                let winner_edge = if margin >= 0.0 {
                    self.effective_diff(matchup)
                } else {
                    -self.effective_diff(matchup)
                };
                let margin_multiplier = (margin.abs().max(1.0) + 1.0).ln();
                let autocorrelation = 2.2 / (0.001 * winner_edge + 2.2);
                self.config.k_factor * margin_multiplier * autocorrelation
            }
        };
        let delta = k * (actual - expected);
        let rating_a = self.rating(matchup.team_a) + delta;
        let rating_b = self.rating(matchup.team_b) - delta;
        self.ratings.insert(matchup.team_a, rating_a);
        self.ratings.insert(matchup.team_b, rating_b);
        self.games += 1;
    }
}

impl Forecast for Ratings {
    fn win_probability(&self, matchup: &Matchup) -> f64 {
        self.expected(matchup)
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;
    use strum::IntoEnumIterator;

    use crate::data::Site;
    use crate::schedule::{Record, Schedule};
    use crate::testing::{four_team_games, four_teams};

    use super::*;

    fn matchup(site: Site) -> Matchup {
        Matchup {
            team_a: TeamId(1),
            team_b: TeamId(2),
            site,
            record_a: Record::default(),
            record_b: Record::default(),
        }
    }

    #[test]
    fn classic_update_is_zero_sum() {
        let mut ratings = Ratings::new(RatingVariant::Classic, RatingConfig::default());
        assert_eq!(0.5, ratings.expected(&matchup(Site::Home)));
        ratings.update(&matchup(Site::Home), 7.0);
        assert_eq!(1_510.0, ratings.rating(TeamId(1)));
        assert_eq!(1_490.0, ratings.rating(TeamId(2)));
        assert_eq!(1_500.0, ratings.rating(TeamId(3)));
        assert_eq!(1, ratings.games());
    }

    #[test]
    fn tie_between_equals_changes_nothing() {
        let mut ratings = Ratings::new(RatingVariant::Classic, RatingConfig::default());
        ratings.update(&matchup(Site::Neutral), 0.0);
        assert_eq!(1_500.0, ratings.rating(TeamId(1)));
        assert_eq!(1_500.0, ratings.rating(TeamId(2)));
    }

    #[test]
    fn home_shift() {
        let ratings = Ratings::new(RatingVariant::HomeAdjusted, RatingConfig::default());
        let expected = 1.0 / (1.0 + 10f64.powf(-65.0 / 400.0));
        assert_float_absolute_eq!(expected, ratings.expected(&matchup(Site::Home)), 1e-12);
        assert_float_absolute_eq!(1.0 - expected, ratings.expected(&matchup(Site::Away)), 1e-12);
        assert_eq!(0.5, ratings.expected(&matchup(Site::Neutral)));
    }

    #[test]
    fn margin_scaling() {
        let mut close = Ratings::new(RatingVariant::MarginScaled, RatingConfig::default());
        close.update(&matchup(Site::Neutral), 1.0);
        let mut rout = Ratings::new(RatingVariant::MarginScaled, RatingConfig::default());
        rout.update(&matchup(Site::Neutral), 30.0);

        // level ratings: K · ln(2) · 0.5 for a one-point win
        assert_float_absolute_eq!(
            1_500.0 + 20.0 * 2f64.ln() * 0.5,
            close.rating(TeamId(1)),
            1e-9
        );
        assert!(rout.rating(TeamId(1)) > close.rating(TeamId(1)));
    }

    #[test]
    fn fit_replays_each_game_once() {
        let schedule = Schedule::build(four_teams(), four_team_games()).unwrap();
        for variant in RatingVariant::iter() {
            let ratings = Ratings::fit(variant, RatingConfig::default(), schedule.training_rows());
            assert_eq!(6, ratings.games());
            let total: f64 = (1..=4).map(|id| ratings.rating(TeamId(id))).sum();
            assert_float_absolute_eq!(6_000.0, total, 1e-9);
            // Charlie lost every game
            assert!(ratings.rating(TeamId(3)) < 1_500.0);
            assert_eq!(None, ratings.margin(&matchup(Site::Home)));
        }
    }

    #[test]
    fn validate() {
        assert!(RatingConfig::default().validate().is_ok());
        assert!(RatingConfig {
            k_factor: 0.0,
            ..RatingConfig::default()
        }
        .validate()
        .is_err());
    }
}
