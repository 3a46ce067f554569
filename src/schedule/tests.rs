use crate::data::Site;
use crate::testing::{four_team_games, four_teams, game, team};

use super::*;

fn build() -> Schedule {
    Schedule::build(four_teams(), four_team_games()).unwrap()
}

#[test]
fn orders_by_date_keeping_input_order() {
    let schedule = build();
    let order: Vec<_> = schedule
        .games()
        .iter()
        .map(|game| (game.seq, game.team_a.team.0, game.team_b.team.0))
        .collect();
    assert_eq!(
        vec![(0, 1, 2), (1, 3, 4), (2, 1, 3), (3, 2, 4), (4, 2, 3), (5, 4, 1)],
        order
    );
}

#[test]
fn point_in_time_records_exclude_own_and_later_results() {
    let schedule = build();
    let records: Vec<_> = schedule
        .games()
        .iter()
        .map(|game| (game.record_a, game.record_b))
        .collect();
    assert_eq!(
        vec![
            (Record::new(0, 0), Record::new(0, 0)),
            (Record::new(0, 0), Record::new(0, 0)),
            (Record::new(1, 0), Record::new(0, 1)),
            (Record::new(0, 1), Record::new(1, 0)),
            (Record::new(1, 1), Record::new(0, 2)),
            (Record::new(1, 1), Record::new(2, 0)),
        ],
        records
    );
}

#[test]
fn games_ahead_from_pre_game_records() {
    let schedule = build();
    let games_ahead: Vec<_> = schedule.games().iter().map(ScheduledGame::games_ahead).collect();
    assert_eq!(vec![0.0, 0.0, 1.0, -1.0, 1.0, -1.0], games_ahead);
}

#[test]
fn standings_after_all_games() {
    let schedule = build();
    let standings = schedule.standings();
    assert_eq!(Record::new(3, 0), standings[&TeamId(1)]);
    assert_eq!(Record::new(2, 1), standings[&TeamId(2)]);
    assert_eq!(Record::new(0, 3), standings[&TeamId(3)]);
    assert_eq!(Record::new(1, 2), standings[&TeamId(4)]);
}

#[test]
fn same_day_games_do_not_see_each_other() {
    let games = vec![
        game((2023, 9, 10), 1, (1, Site::Home, 10), (2, 3)),
        game((2023, 9, 10), 1, (2, Site::Home, 10), (1, 3)),
        game((2023, 9, 11), 1, (1, Site::Neutral, 7), (2, 7)),
    ];
    let schedule = Schedule::build(four_teams(), games).unwrap();
    assert_eq!(Record::new(0, 0), schedule.games()[1].record_a);
    assert_eq!(Record::new(0, 0), schedule.games()[1].record_b);
    assert_eq!(Record::new(1, 1), schedule.games()[2].record_a);
    assert_eq!(
        Record {
            wins: 1,
            losses: 1,
            ties: 1
        },
        schedule.standings()[&TeamId(1)]
    );
}

#[test]
fn team_without_games_keeps_empty_record() {
    let mut teams = four_teams();
    teams.push(team(9, "Idle"));
    let schedule = Schedule::build(teams, four_team_games()).unwrap();
    assert_eq!(Record::default(), schedule.standings()[&TeamId(9)]);
    assert_eq!("Idle", schedule.team(TeamId(9)).unwrap().name);
}

#[test]
fn rows_and_weeks() {
    let schedule = build();
    assert_eq!(vec![1, 2, 3], schedule.weeks());
    assert_eq!(12, schedule.training_rows().len());
    assert_eq!(12, schedule.prediction_rows().len());

    let tied = vec![game((2023, 9, 10), 1, (1, Site::Home, 17), (2, 17))];
    let schedule = Schedule::build(four_teams(), tied).unwrap();
    assert_eq!(4, schedule.training_rows().len());
    assert_eq!(2, schedule.prediction_rows().len());
    assert!(schedule
        .prediction_rows()
        .iter()
        .all(|row| row.outcome == 0.5));
}

#[test]
fn integrity_errors() {
    assert_eq!(
        DataIntegrityError::EmptyRoster,
        Schedule::build(vec![], four_team_games()).unwrap_err()
    );

    let mut teams = four_teams();
    teams.push(team(2, "Bravo again"));
    assert_eq!(
        DataIntegrityError::DuplicateTeam(TeamId(2)),
        Schedule::build(teams, vec![]).unwrap_err()
    );

    let mut games = four_team_games();
    games[3].team_b.team = TeamId(99);
    assert_eq!(
        DataIntegrityError::UnknownTeam {
            game: 3,
            team: TeamId(99)
        },
        Schedule::build(four_teams(), games).unwrap_err()
    );

    let mut games = four_team_games();
    games[4].date = None;
    assert_eq!(
        DataIntegrityError::MissingDate { game: 4 },
        Schedule::build(four_teams(), games).unwrap_err()
    );

    let mut games = four_team_games();
    games[0].team_b.team = games[0].team_a.team;
    assert_eq!(
        DataIntegrityError::SelfMatchup {
            game: 0,
            team: TeamId(2)
        },
        Schedule::build(four_teams(), games).unwrap_err()
    );

    let mut games = four_team_games();
    games[1].team_b.site = Site::Home;
    assert_eq!(
        DataIntegrityError::InconsistentSites { game: 1 },
        Schedule::build(four_teams(), games).unwrap_err()
    );
}
