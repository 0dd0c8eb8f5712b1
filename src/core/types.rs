use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(alias = "mattress")]
    Mattress,
    #[serde(alias = "conservative")]
    Conservative,
    #[serde(alias = "moderate")]
    Moderate,
    #[serde(alias = "aggressive")]
    Aggressive,
    #[serde(alias = "google")]
    Google,
    #[serde(rename = "AutoZone", alias = "autoZone", alias = "autozone")]
    AutoZone,
    #[serde(
        rename = "Dollar Tree",
        alias = "DollarTree",
        alias = "dollarTree",
        alias = "dollar-tree"
    )]
    DollarTree,
    #[serde(
        rename = "Electronic Arts",
        alias = "ElectronicArts",
        alias = "electronicArts",
        alias = "electronic-arts",
        alias = "ea"
    )]
    ElectronicArts,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::Mattress,
        Strategy::Conservative,
        Strategy::Moderate,
        Strategy::Aggressive,
        Strategy::Google,
        Strategy::AutoZone,
        Strategy::DollarTree,
        Strategy::ElectronicArts,
    ];

    /// Display label, as stored in the risk table.
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Mattress => "Mattress",
            Strategy::Conservative => "Conservative",
            Strategy::Moderate => "Moderate",
            Strategy::Aggressive => "Aggressive",
            Strategy::Google => "Google",
            Strategy::AutoZone => "AutoZone",
            Strategy::DollarTree => "Dollar Tree",
            Strategy::ElectronicArts => "Electronic Arts",
        }
    }

    /// Name of the allocation field carrying this strategy's weight in an
    /// invest request.
    pub fn request_field(self) -> &'static str {
        match self {
            Strategy::Mattress => "mattress",
            Strategy::Conservative => "conservative",
            Strategy::Moderate => "moderate",
            Strategy::Aggressive => "aggressive",
            Strategy::Google => "google",
            Strategy::AutoZone => "autoZone",
            Strategy::DollarTree => "dollarTree",
            Strategy::ElectronicArts => "ea",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Strategy {
    type Err = SimError;

    /// Accepts labels, request field names and kebab/compact spellings,
    /// ignoring case, spaces, dashes and underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        let strategy = match key.as_str() {
            "mattress" => Strategy::Mattress,
            "conservative" => Strategy::Conservative,
            "moderate" => Strategy::Moderate,
            "aggressive" => Strategy::Aggressive,
            "google" => Strategy::Google,
            "autozone" => Strategy::AutoZone,
            "dollartree" => Strategy::DollarTree,
            "electronicarts" | "ea" => Strategy::ElectronicArts,
            _ => return Err(SimError::UnknownStrategy(s.to_string())),
        };
        Ok(strategy)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRecord {
    pub year: i32,
    pub strategy: Strategy,
    #[serde(alias = "gain")]
    pub gain_percent: f64,
}

/// Percentage of the current fund placed in each strategy for one rebalance.
///
/// Weights are taken as given: they are not clamped and need not sum to 100.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocationSet {
    weights: BTreeMap<Strategy, f64>,
}

impl AllocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: Strategy, percent: f64) -> Self {
        self.set(strategy, percent);
        self
    }

    pub fn set(&mut self, strategy: Strategy, percent: f64) {
        self.weights.insert(strategy, percent);
    }

    pub fn weight(&self, strategy: Strategy) -> Option<f64> {
        self.weights.get(&strategy).copied()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn is_normalized(&self) -> bool {
        (self.total() - 100.0).abs() <= 1e-9
    }
}

impl FromIterator<(Strategy, f64)> for AllocationSet {
    fn from_iter<I: IntoIterator<Item = (Strategy, f64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub x: i32,
    pub y: f64,
    pub strategy: Option<Strategy>,
    pub previous_year: Option<f64>,
    pub growth: Option<f64>,
}

impl HistoryPoint {
    pub fn origin(amount: f64) -> Self {
        Self {
            x: 0,
            y: amount,
            strategy: None,
            previous_year: None,
            growth: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rebalance {
    pub new_fund: f64,
    pub growth: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioState {
    pub initial_fund: f64,
    pub current_fund: f64,
    pub previous_fund: Option<f64>,
    pub year: i32,
    #[serde(rename = "year5Amt")]
    pub year5_amt: f64,
    #[serde(rename = "risk")]
    pub history: Vec<HistoryPoint>,
}
