//! A fixed reference policy: the team with the better pre-game record wins; on level records the
//! home team wins; on level records at a neutral site the result is a toss-up.

use crate::matchup::Matchup;
use crate::model::Forecast;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Heuristic;

impl Forecast for Heuristic {
    fn win_probability(&self, matchup: &Matchup) -> f64 {
        let games_ahead = matchup.games_ahead();
        if games_ahead > 0.0 {
            1.0
        } else if games_ahead < 0.0 {
            0.0
        } else {
            // +1 → 1, −1 → 0, neutral → 0.5
            (1.0 + matchup.site.indicator()) / 2.0
        }
    }
}
