use stanza::style::HAlign::Left;
use stanza::style::{HAlign, Header, MinWidth, Separator, Styles};
use stanza::table::{Col, Row, Table};

use crate::data::{Fixture, TeamId};
use crate::ranking::{MatchupSimulation, RankedTeam};
use crate::schedule::{Record, Schedule};
use crate::score::AccuracySummary;

fn format_record(record: &Record) -> String {
    format!("{}-{}-{}", record.wins, record.losses, record.ties)
}

fn team_name(schedule: &Schedule, team: TeamId) -> String {
    schedule
        .team(team)
        .map(|team| team.name.clone())
        .unwrap_or_else(|| team.to_string())
}

pub fn tabulate_ranking(ranking: &[RankedTeam]) -> Table {
    let mut table = Table::default()
        .with_cols({
            let mut cols = vec![
                Col::new(Styles::default().with(MinWidth(12)).with(Left)),
                Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
            ];
            for separated in [true, false, false, true, false, false, true, false] {
                cols.push(Col::new(
                    Styles::default()
                        .with(Separator(separated))
                        .with(MinWidth(8))
                        .with(HAlign::Right),
                ));
            }
            cols.push(Col::new(
                Styles::default()
                    .with(Separator(true))
                    .with(MinWidth(8))
                    .with(HAlign::Right),
            ));
            cols
        })
        .with_row(Row::new(
            Styles::default().with(Header(true)).with(Separator(true)),
            vec![
                "".into(),
                "".into(),
                "Margin".into(),
                "".into(),
                "".into(),
                "Win".into(),
                "".into(),
                "".into(),
                "Luck".into(),
                "".into(),
                "".into(),
            ],
        ))
        .with_row(Row::new(
            Styles::default().with(Header(true)),
            vec![
                "Team".into(),
                "W-L-T".into(),
                "Mean".into(),
                "SE".into(),
                "Rank".into(),
                "Mean".into(),
                "SE".into(),
                "Rank".into(),
                "Luck".into(),
                "Rank".into(),
                "Combined".into(),
            ],
        ));
    for team in ranking {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                team.name.clone().into(),
                format_record(&team.record).into(),
                format!("{:+.2}", team.margin.mean).into(),
                format!("{:.3}", team.margin.std_error).into(),
                format!("{}", team.margin.rank).into(),
                format!("{:.3}", team.win.mean).into(),
                format!("{:.4}", team.win.std_error).into(),
                format!("{}", team.win.rank).into(),
                format!("{:+}", team.luck).into(),
                format!("{}", team.luck_rank).into(),
                format!("{:.1}", team.combined_rank).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_accuracy(summary: &AccuracySummary) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(18)).with(Left)),
            Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)),
            vec![
                "Family".into(),
                "Accuracy".into(),
                "Picks".into(),
                "Scored".into(),
                "Excluded".into(),
            ],
        ));
    let format_rate = |rate: Option<f64>| match rate {
        Some(rate) => format!("{rate:.4}"),
        None => "-".into(),
    };
    for family in &summary.families {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                format!("{}", family.family).into(),
                format_rate(family.accuracy()).into(),
                format_rate(family.pick_accuracy()).into(),
                format!("{}", family.scored).into(),
                format!("{}", family.excluded).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_failures(summary: &AccuracySummary) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(14)).with(Left)),
            Col::new(Styles::default().with(MinWidth(18)).with(Left)),
            Col::new(Styles::default().with(MinWidth(40)).with(Left)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)),
            vec!["Window".into(), "Family".into(), "Reason".into()],
        ));
    table.push_rows(summary.failures.iter().map(|failure| {
        Row::new(
            Styles::default(),
            vec![
                format!("{}", failure.window).into(),
                format!("{}", failure.family).into(),
                failure.reason.clone().into(),
            ],
        )
    }));
    table
}

fn describe_fixture(schedule: &Schedule, fixture: &Fixture) -> String {
    format!(
        "{} v {} ({})",
        team_name(schedule, fixture.home),
        team_name(schedule, fixture.visitor),
        fixture.site
    )
}

pub fn tabulate_matchups(schedule: &Schedule, matchups: &[MatchupSimulation]) -> Table {
    let quantiles: Vec<_> = matchups
        .first()
        .map(|matchup| matchup.spread.quantiles.iter().map(|(q, _)| *q).collect())
        .unwrap_or_default();
    let mut table = Table::default()
        .with_cols({
            let mut cols = vec![
                Col::new(Styles::default().with(MinWidth(30)).with(Left)),
                Col::new(Styles::default().with(MinWidth(10)).with(HAlign::Right)),
                Col::new(Styles::default().with(MinWidth(8)).with(HAlign::Right)),
                Col::new(
                    Styles::default()
                        .with(Separator(true))
                        .with(MinWidth(10))
                        .with(HAlign::Right),
                ),
            ];
            for _ in &quantiles {
                cols.push(Col::new(
                    Styles::default().with(MinWidth(8)).with(HAlign::Right),
                ));
            }
            cols
        })
        .with_row({
            let mut header_cells = vec![
                "Fixture".into(),
                "P(home)".into(),
                "SE".into(),
                "Spread".into(),
            ];
            for quantile in &quantiles {
                header_cells.push(format!("Q{:.0}", quantile * 100.).into());
            }
            Row::new(Styles::default().with(Header(true)), header_cells)
        });
    for matchup in matchups {
        let mut row_cells = vec![
            describe_fixture(schedule, &matchup.fixture).into(),
            format!("{:.4}", matchup.win_probability).into(),
            format!("{:.4}", matchup.win_std_error).into(),
            format!("{:+.2}", matchup.spread.mean).into(),
        ];
        for (_, value) in &matchup.spread.quantiles {
            row_cells.push(format!("{value:+.1}").into());
        }
        table.push_row(Row::new(Styles::default(), row_cells));
    }
    table
}
