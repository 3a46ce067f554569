//! Testing helpers.

use assert_float_eq::*;
use chrono::{Days, NaiveDate};

use crate::data::{Entrant, Game, Site, Team, TeamId};
use crate::random;

pub fn assert_slice_f64_relative(expected: &[f64], actual: &[f64], epsilon: f64) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "lengths do not match: {} ≠ {}",
        expected.len(),
        actual.len()
    );
    for (index, &expected) in expected.iter().enumerate() {
        let actual = actual[index];
        if actual != expected {
            assert_float_relative_eq!(expected, actual, epsilon);
        }
    }
}

pub fn team(id: u32, name: &str) -> Team {
    Team {
        id: TeamId(id),
        name: name.into(),
    }
}

pub fn game(
    date: (i32, u32, u32),
    week: u32,
    (team_a, site_a, score_a): (u32, Site, u16),
    (team_b, score_b): (u32, u16),
) -> Game {
    Game {
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
        week,
        team_a: Entrant {
            team: TeamId(team_a),
            site: site_a,
            score: score_a,
        },
        team_b: Entrant {
            team: TeamId(team_b),
            site: site_a.flip(),
            score: score_b,
        },
    }
}

pub fn four_teams() -> Vec<Team> {
    vec![
        team(1, "Alpha"),
        team(2, "Bravo"),
        team(3, "Charlie"),
        team(4, "Delta"),
    ]
}

/// A 4-team, 6-game round robin over three weeks, supplied out of order.
///
/// Final records: Alpha 3-0 (+3), Bravo 2-1 (+10), Charlie 0-3 (−53), Delta 1-2 (+40). Alpha wins
/// every game by a single point while Delta's one win is a rout, so the win and margin views rank
/// them very differently. In week 2, 0-1 Bravo upsets 1-0 Delta at a neutral site.
pub fn four_team_games() -> Vec<Game> {
    use Site::{Home, Neutral};
    vec![
        game((2023, 9, 24), 3, (2, Home, 27), (3, 17)),
        game((2023, 9, 10), 1, (1, Home, 30), (2, 29)),
        game((2023, 9, 17), 2, (1, Home, 21), (3, 20)),
        game((2023, 9, 10), 1, (3, Neutral, 3), (4, 45)),
        game((2023, 9, 24), 3, (4, Home, 16), (1, 17)),
        game((2023, 9, 17), 2, (2, Neutral, 24), (4, 23)),
    ]
}

/// A single round robin of `teams` (even) teams over `weeks` (fewer than `teams`) weekly rounds.
///
/// Team `i` has a true points strength of `1.5·(i − (teams + 1)/2)`, the home side gains 3 points,
/// and each margin carries `Normal(0, 12)` noise. Scores are centred on 24.
pub fn league(teams: u32, weeks: u32, seed: u64) -> (Vec<Team>, Vec<Game>) {
    assert!(teams % 2 == 0 && weeks < teams);
    let roster = (1..=teams)
        .map(|id| team(id, &format!("Team {id}")))
        .collect();
    let strength = |id: u32| 1.5 * (id as f64 - (teams as f64 + 1.0) / 2.0);
    let opening = NaiveDate::from_ymd_opt(2023, 3, 5).unwrap();
    let slots = teams - 1;
    let mut rand = random::seeded(seed);
    let mut games = vec![];
    for week in 1..=weeks {
        let round = week - 1;
        for pair in 0..teams / 2 {
            let first = (round + pair) % slots;
            let second = if pair == 0 {
                slots
            } else {
                (round + slots - pair) % slots
            };
            let (home, away) = if (round + pair) % 2 == 0 {
                (first + 1, second + 1)
            } else {
                (second + 1, first + 1)
            };
            let margin = strength(home) - strength(away)
                + 3.0
                + random::next_normal(&mut rand, 0.0, 12.0);
            let home_score = (24.0 + margin / 2.0).round().max(0.0) as u16;
            let away_score = (24.0 - margin / 2.0).round().max(0.0) as u16;
            let mut played = game(
                (2023, 3, 5),
                week,
                (home, Site::Home, home_score),
                (away, away_score),
            );
            played.date = opening.checked_add_days(Days::new(7 * round as u64));
            games.push(played);
        }
    }
    (roster, games)
}
