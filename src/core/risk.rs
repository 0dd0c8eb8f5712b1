use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::types::{RiskRecord, Strategy};
use crate::error::SimError;

const EMBEDDED_RISK_TABLE: &str = include_str!("../../data/risk_table.json");

/// Read-only lookup over historical gain/loss records.
pub trait RiskTable: Send + Sync {
    /// Every record for `year`, one per strategy active that year.
    fn find_by_year(&self, year: i32) -> Vec<RiskRecord>;

    /// Every record for `strategy`, ordered by ascending year.
    fn find_by_strategy(&self, strategy: Strategy) -> Vec<RiskRecord>;

    /// Distinct years covered by the table, ascending.
    fn years(&self) -> Vec<i32>;
}

#[derive(Debug, Clone)]
pub struct InMemoryRiskTable {
    records: Vec<RiskRecord>,
}

impl InMemoryRiskTable {
    pub fn new(mut records: Vec<RiskRecord>) -> Result<Self, SimError> {
        let mut seen = HashSet::new();
        for record in &records {
            if !record.gain_percent.is_finite() {
                return Err(SimError::RiskTable(format!(
                    "non-finite gain for {} in year {}",
                    record.strategy, record.year
                )));
            }
            if !seen.insert((record.year, record.strategy)) {
                return Err(SimError::RiskTable(format!(
                    "duplicate record for {} in year {}",
                    record.strategy, record.year
                )));
            }
        }
        records.sort_by_key(|r| (r.year, r.strategy));
        Ok(Self { records })
    }

    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let records: Vec<RiskRecord> = serde_json::from_str(json)?;
        Self::new(records)
    }

    pub fn from_path(path: &Path) -> Result<Self, SimError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The table bundled with the binary.
    pub fn embedded() -> Result<Self, SimError> {
        Self::from_json(EMBEDDED_RISK_TABLE)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RiskTable for InMemoryRiskTable {
    fn find_by_year(&self, year: i32) -> Vec<RiskRecord> {
        self.records
            .iter()
            .filter(|r| r.year == year)
            .copied()
            .collect()
    }

    fn find_by_strategy(&self, strategy: Strategy) -> Vec<RiskRecord> {
        // records are kept sorted by (year, strategy)
        self.records
            .iter()
            .filter(|r| r.strategy == strategy)
            .copied()
            .collect()
    }

    fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.records.iter().map(|r| r.year).collect();
        years.dedup();
        years
    }
}
