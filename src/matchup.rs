//! Symmetrized matchup rows.
//!
//! Every game becomes two mirrored rows, one from each participant's perspective, so that each
//! team occupies both matchup roles. Team-relative fields (site, margin, outcome, records) are
//! flipped or swapped in the mirror. For fitting, a tied row is further split into a loss and a
//! win, so models only ever train on binary outcomes.

use ordinalizer::Ordinal;
use rustc_hash::FxHashMap;
use strum::EnumCount;
use strum_macros::{Display, EnumCount, EnumIter};

use crate::data::{Site, TeamId};
use crate::linear::regression::AsIndex;
use crate::schedule::{Record, ScheduledGame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Orientation {
    Primary,
    Mirrored,
}

/// Which half of a split tie a row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TieSplit {
    Loss,
    Win,
}

/// The inputs every model may condition a prediction on.
#[derive(Debug, Clone, PartialEq)]
pub struct Matchup {
    pub team_a: TeamId,
    pub team_b: TeamId,
    /// Site of team A.
    pub site: Site,
    pub record_a: Record,
    pub record_b: Record,
}
impl Matchup {
    pub fn games_ahead(&self) -> f64 {
        self.record_a.games_ahead(&self.record_b)
    }

    pub fn mirror(&self) -> Matchup {
        Matchup {
            team_a: self.team_b,
            team_b: self.team_a,
            site: self.site.flip(),
            record_a: self.record_b,
            record_b: self.record_a,
        }
    }

    pub fn features(&self) -> [f64; Feature::COUNT] {
        let mut features = [0.0; Feature::COUNT];
        features[Feature::Site.as_index()] = self.site.indicator();
        features[Feature::WinsA.as_index()] = self.record_a.wins as f64;
        features[Feature::LossesA.as_index()] = self.record_a.losses as f64;
        features[Feature::WinsB.as_index()] = self.record_b.wins as f64;
        features[Feature::LossesB.as_index()] = self.record_b.losses as f64;
        features[Feature::GamesAhead.as_index()] = self.games_ahead();
        features
    }
}

/// Point-in-time features shared by the classifier families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Ordinal, EnumCount, EnumIter, Display)]
pub enum Feature {
    Site,
    WinsA,
    LossesA,
    WinsB,
    LossesB,
    GamesAhead,
}

impl AsIndex for Feature {
    fn as_index(&self) -> usize {
        self.ordinal()
    }
}

/// Identifies a row independently of its contents.
pub type RowKey = (usize, Orientation, Option<TieSplit>);

#[derive(Debug, Clone, PartialEq)]
pub struct MatchupRow {
    /// Sequence position of the source game.
    pub game: usize,
    pub week: u32,
    pub orientation: Orientation,
    pub tie_split: Option<TieSplit>,
    pub matchup: Matchup,
    /// Team A's points less team B's points.
    pub margin: f64,
    /// 1, 0, or 0.5 for an unsplit tie.
    pub outcome: f64,
}
impl MatchupRow {
    pub fn key(&self) -> RowKey {
        (self.game, self.orientation, self.tie_split)
    }

    /// Exactly one row per game is canonical: the primary orientation, taking the loss half of a
    /// split tie. Sequential models that must see each game once iterate over these.
    pub fn is_canonical(&self) -> bool {
        self.orientation == Orientation::Primary && self.tie_split != Some(TieSplit::Win)
    }
}

/// The two mirrored rows of a game. Ties keep an outcome of 0.5.
pub fn symmetrize(game: &ScheduledGame) -> [MatchupRow; 2] {
    let matchup = Matchup {
        team_a: game.team_a.team,
        team_b: game.team_b.team,
        site: game.team_a.site,
        record_a: game.record_a,
        record_b: game.record_b,
    };
    let margin = game.margin();
    let outcome = game.outcome();
    let mirrored = MatchupRow {
        game: game.seq,
        week: game.week,
        orientation: Orientation::Mirrored,
        tie_split: None,
        matchup: matchup.mirror(),
        margin: -margin,
        outcome: 1.0 - outcome,
    };
    let primary = MatchupRow {
        game: game.seq,
        week: game.week,
        orientation: Orientation::Primary,
        tie_split: None,
        matchup,
        margin,
        outcome,
    };
    [primary, mirrored]
}

/// Replaces each tied row with a loss row and a win row; decisive rows pass through.
pub fn split_ties(rows: impl IntoIterator<Item = MatchupRow>) -> Vec<MatchupRow> {
    let mut split = vec![];
    for row in rows {
        if row.outcome == 0.5 {
            for (tie_split, outcome) in [(TieSplit::Loss, 0.0), (TieSplit::Win, 1.0)] {
                split.push(MatchupRow {
                    tie_split: Some(tie_split),
                    outcome,
                    ..row.clone()
                });
            }
        } else {
            split.push(row);
        }
    }
    split
}

/// All training rows of a game: 2 for a decisive game, 4 for a tie.
pub fn expand(game: &ScheduledGame) -> Vec<MatchupRow> {
    split_ties(symmetrize(game))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub game: usize,
    pub team_a: TeamId,
    pub team_b: TeamId,
    pub margin: f64,
    pub outcome: f64,
}

/// Reverses [`expand`] (or [`symmetrize`]) for a single game, recovering the margin and outcome
/// from team A's perspective. Returns `None` if the rows do not describe exactly one game
/// consistently.
pub fn reconstruct(rows: &[MatchupRow]) -> Option<Reconstruction> {
    let first = rows.first()?;
    if rows.iter().any(|row| row.game != first.game) {
        return None;
    }
    let primary = rows.iter().find(|row| row.orientation == Orientation::Primary)?;
    let mirrored = rows.iter().find(|row| row.orientation == Orientation::Mirrored)?;
    if mirrored.margin != -primary.margin || mirrored.matchup != primary.matchup.mirror() {
        return None;
    }
    let tied = rows.iter().any(|row| row.tie_split.is_some()) || primary.outcome == 0.5;
    Some(Reconstruction {
        game: first.game,
        team_a: primary.matchup.team_a,
        team_b: primary.matchup.team_b,
        margin: primary.margin,
        outcome: if tied { 0.5 } else { primary.outcome },
    })
}

/// Injective map from team identifiers to contiguous, zero-based positions, ordered by
/// identifier. Rebuilt for every training window, since the window's team set can change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamIndex {
    ids: Vec<TeamId>,
    positions: FxHashMap<TeamId, usize>,
}
impl TeamIndex {
    pub fn from_ids(ids: impl IntoIterator<Item = TeamId>) -> Self {
        let mut ids: Vec<_> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        let positions = ids
            .iter()
            .enumerate()
            .map(|(position, &id)| (id, position))
            .collect();
        Self { ids, positions }
    }

    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a MatchupRow>) -> Self {
        Self::from_ids(
            rows.into_iter()
                .flat_map(|row| [row.matchup.team_a, row.matchup.team_b]),
        )
    }

    pub fn position(&self, id: TeamId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn id(&self, position: usize) -> TeamId {
        self.ids[position]
    }

    pub fn ids(&self) -> &[TeamId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
