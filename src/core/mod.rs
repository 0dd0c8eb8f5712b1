mod engine;
mod risk;
mod types;

pub use engine::{
    PROJECTION_SEED_YEAR, Projection, compute_rebalance, growth_percent, project_strategy,
    round_half_up,
};
pub use risk::{InMemoryRiskTable, RiskTable};
pub use types::{AllocationSet, HistoryPoint, PortfolioState, Rebalance, RiskRecord, Strategy};
