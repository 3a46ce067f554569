//! External input records: the team roster, the game log and the fixtures to forecast. These
//! arrive already deduplicated; the only I/O here is loading them from a JSON document.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::path::Path;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub u32);

impl Display for TeamId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

/// Where a team played, serialized as its indicator: home = +1, away = −1, neutral = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "i8", into = "i8")]
#[strum(serialize_all = "lowercase")]
pub enum Site {
    Home,
    Away,
    Neutral,
}
impl Site {
    #[inline]
    pub fn indicator(&self) -> f64 {
        match self {
            Site::Home => 1.0,
            Site::Away => -1.0,
            Site::Neutral => 0.0,
        }
    }

    /// The site from the opponent's perspective.
    #[inline]
    pub fn flip(&self) -> Site {
        match self {
            Site::Home => Site::Away,
            Site::Away => Site::Home,
            Site::Neutral => Site::Neutral,
        }
    }
}

impl TryFrom<i8> for Site {
    type Error = anyhow::Error;

    fn try_from(indicator: i8) -> Result<Self, Self::Error> {
        match indicator {
            1 => Ok(Site::Home),
            -1 => Ok(Site::Away),
            0 => Ok(Site::Neutral),
            other => Err(anyhow!("invalid site indicator {other}")),
        }
    }
}

impl From<Site> for i8 {
    fn from(site: Site) -> Self {
        match site {
            Site::Home => 1,
            Site::Away => -1,
            Site::Neutral => 0,
        }
    }
}

/// One participant's side of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entrant {
    pub team: TeamId,
    pub site: Site,
    pub score: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Missing dates are legal input but rejected by the schedule.
    pub date: Option<NaiveDate>,
    pub week: u32,
    pub team_a: Entrant,
    pub team_b: Entrant,
}
impl Game {
    /// Points scored by team A less points scored by team B.
    pub fn margin(&self) -> f64 {
        self.team_a.score as f64 - self.team_b.score as f64
    }

    /// 1 if team A won, 0 if it lost and 0.5 for a tie.
    pub fn outcome(&self) -> f64 {
        outcome_of(self.margin())
    }
}

#[inline]
pub fn outcome_of(margin: f64) -> f64 {
    if margin > 0.0 {
        1.0
    } else if margin < 0.0 {
        0.0
    } else {
        0.5
    }
}

/// A future matchup to be simulated between two named teams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub home: TeamId,
    pub visitor: TeamId,
    /// Site from the home team's perspective.
    pub site: Site,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub teams: Vec<Team>,
    pub games: Vec<Game>,
    #[serde(default)]
    pub fixtures: Vec<Fixture>,
}
impl Season {
    pub fn read_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
