//! Leakage-free rolling backtests of candidate forecasting models over a round-robin league
//! season, and Bayesian posterior ranking of its teams by simulation against a generic opponent.
//! Contrasting the margin-based and win-based rankings yields a "close game luck" metric.

#![allow(clippy::too_many_arguments)]

pub mod backtest;
pub mod config;
pub mod data;
pub mod linear;
pub mod matchup;
pub mod model;
pub mod opt;
pub mod print;
pub mod random;
pub mod ranking;
pub mod schedule;
pub mod score;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

#[doc = include_str!("../README.md")]
#[cfg(doc)]
fn readme() {}
