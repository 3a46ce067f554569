//! Top-level configuration of a league run.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backtest::BacktestConfig;
use crate::ranking::RankingConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backtest: BacktestConfig,
    pub ranking: RankingConfig,
}
impl Config {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.backtest.validate()?;
        self.ranking.validate()?;
        Ok(())
    }

    /// Loads a JSON document; omitted fields take their defaults.
    pub fn read_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
