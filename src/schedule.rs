//! The schedule is the chronologically ordered game log, with each game annotated by the
//! point-in-time records of both participants. A record attached to a game counts only the
//! results of games played strictly before that game's date, so neither the game's own result
//! nor that of any game on the same day or later can leak into it.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::data::{outcome_of, Entrant, Game, Team, TeamId};
use crate::matchup::{self, MatchupRow};

#[derive(Debug, Error, PartialEq)]
pub enum DataIntegrityError {
    #[error("the team roster is empty")]
    EmptyRoster,

    #[error("team {0} appears more than once in the roster")]
    DuplicateTeam(TeamId),

    #[error("game {game} references team {team}, which is not in the roster")]
    UnknownTeam { game: usize, team: TeamId },

    #[error("game {game} has no date")]
    MissingDate { game: usize },

    #[error("game {game} pits team {team} against itself")]
    SelfMatchup { game: usize, team: TeamId },

    #[error("game {game} has inconsistent site indicators")]
    InconsistentSites { game: usize },
}

/// Wins, losses and ties accumulated over some prefix of the schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub wins: u16,
    pub losses: u16,
    pub ties: u16,
}
impl Record {
    pub fn new(wins: u16, losses: u16) -> Self {
        Self {
            wins,
            losses,
            ties: 0,
        }
    }

    pub fn apply(&mut self, outcome: f64) {
        if outcome > 0.5 {
            self.wins += 1;
        } else if outcome < 0.5 {
            self.losses += 1;
        } else {
            self.ties += 1;
        }
    }

    pub fn played(&self) -> u16 {
        self.wins + self.losses + self.ties
    }

    /// `((winsA − winsB) + (lossesB − lossesA)) / 2`, with `self` as team A.
    pub fn games_ahead(&self, other: &Record) -> f64 {
        ((self.wins as f64 - other.wins as f64) + (other.losses as f64 - self.losses as f64)) / 2.0
    }
}

/// A game in its final sequence position, with the pre-game records of both participants.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledGame {
    pub seq: usize,
    pub date: NaiveDate,
    pub week: u32,
    pub team_a: Entrant,
    pub team_b: Entrant,
    pub record_a: Record,
    pub record_b: Record,
}
impl ScheduledGame {
    pub fn margin(&self) -> f64 {
        self.team_a.score as f64 - self.team_b.score as f64
    }

    pub fn outcome(&self) -> f64 {
        outcome_of(self.margin())
    }

    pub fn games_ahead(&self) -> f64 {
        self.record_a.games_ahead(&self.record_b)
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    teams: Vec<Team>,
    games: Vec<ScheduledGame>,
    standings: FxHashMap<TeamId, Record>,
    training_rows: Vec<MatchupRow>,
    prediction_rows: Vec<MatchupRow>,
}
impl Schedule {
    /// Orders the games by date (input order breaks ties) and attaches point-in-time records.
    pub fn build(teams: Vec<Team>, games: Vec<Game>) -> Result<Self, DataIntegrityError> {
        if teams.is_empty() {
            return Err(DataIntegrityError::EmptyRoster);
        }
        let mut roster = FxHashSet::default();
        for team in &teams {
            if !roster.insert(team.id) {
                return Err(DataIntegrityError::DuplicateTeam(team.id));
            }
        }

        let mut dated = Vec::with_capacity(games.len());
        for (index, game) in games.into_iter().enumerate() {
            validate_game(index, &game, &roster)?;
            let date = game.date.ok_or(DataIntegrityError::MissingDate { game: index })?;
            dated.push((date, game));
        }
        dated.sort_by_key(|(date, _)| *date);

        let mut running: FxHashMap<TeamId, Record> = teams
            .iter()
            .map(|team| (team.id, Record::default()))
            .collect();
        let mut scheduled = Vec::with_capacity(dated.len());
        let mut day_start = 0;
        while day_start < dated.len() {
            let date = dated[day_start].0;
            let day_end = dated[day_start..]
                .iter()
                .position(|(other, _)| *other != date)
                .map_or(dated.len(), |offset| day_start + offset);

            for (_, game) in &dated[day_start..day_end] {
                scheduled.push(ScheduledGame {
                    seq: scheduled.len(),
                    date,
                    week: game.week,
                    team_a: game.team_a.clone(),
                    team_b: game.team_b.clone(),
                    record_a: running[&game.team_a.team],
                    record_b: running[&game.team_b.team],
                });
            }
            for (_, game) in &dated[day_start..day_end] {
                let outcome = game.outcome();
                if let Some(record) = running.get_mut(&game.team_a.team) {
                    record.apply(outcome);
                }
                if let Some(record) = running.get_mut(&game.team_b.team) {
                    record.apply(1.0 - outcome);
                }
            }
            day_start = day_end;
        }

        let training_rows = scheduled.iter().flat_map(matchup::expand).collect();
        let prediction_rows = scheduled.iter().flat_map(matchup::symmetrize).collect();
        debug!(
            "built schedule of {} games across {} teams",
            scheduled.len(),
            teams.len()
        );
        Ok(Self {
            teams,
            games: scheduled,
            standings: running,
            training_rows,
            prediction_rows,
        })
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.iter().find(|team| team.id == id)
    }

    pub fn games(&self) -> &[ScheduledGame] {
        &self.games
    }

    /// Final records, after every game in the schedule.
    pub fn standings(&self) -> &FxHashMap<TeamId, Record> {
        &self.standings
    }

    /// Distinct week indices, ascending.
    pub fn weeks(&self) -> Vec<u32> {
        let mut weeks: Vec<_> = self.games.iter().map(|game| game.week).collect();
        weeks.sort_unstable();
        weeks.dedup();
        weeks
    }

    /// Mirrored rows with tied games split into a loss and a win, for fitting.
    pub fn training_rows(&self) -> &[MatchupRow] {
        &self.training_rows
    }

    /// Mirrored rows with ties retained as half-outcomes, for scoring.
    pub fn prediction_rows(&self) -> &[MatchupRow] {
        &self.prediction_rows
    }
}

fn validate_game(
    index: usize,
    game: &Game,
    roster: &FxHashSet<TeamId>,
) -> Result<(), DataIntegrityError> {
    for entrant in [&game.team_a, &game.team_b] {
        if !roster.contains(&entrant.team) {
            return Err(DataIntegrityError::UnknownTeam {
                game: index,
                team: entrant.team,
            });
        }
    }
    if game.team_a.team == game.team_b.team {
        return Err(DataIntegrityError::SelfMatchup {
            game: index,
            team: game.team_a.team,
        });
    }
    if game.team_a.site.flip() != game.team_b.site {
        return Err(DataIntegrityError::InconsistentSites { game: index });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
