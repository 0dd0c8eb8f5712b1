use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use crate::api::{AppState, DEFAULT_INITIAL_FUND, run_http_server, validate_fund, validate_year};
use crate::core::{
    AllocationSet, HistoryPoint, InMemoryRiskTable, Rebalance, RiskTable, Strategy,
    compute_rebalance, project_strategy,
};
use crate::error::SimError;

#[derive(Parser, Debug)]
#[command(
    name = "portfolio-sim",
    about = "Yearly portfolio growth simulator over a fixed table of strategy returns"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Blend one year of returns over an allocation and print the outcome
    Rebalance(RebalanceArgs),
    /// Compound a starting amount through one strategy's yearly returns
    Project(ProjectArgs),
}

#[derive(Args, Debug)]
pub struct RiskTableArgs {
    #[arg(
        long,
        help = "JSON file of {year, strategy, gain} records; defaults to the bundled table"
    )]
    pub risk_table: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    #[arg(
        long,
        default_value_t = DEFAULT_INITIAL_FUND,
        help = "Starting fund for newly registered users"
    )]
    pub initial_fund: f64,
    #[command(flatten)]
    pub table: RiskTableArgs,
}

#[derive(Args, Debug)]
pub struct RebalanceArgs {
    #[arg(long, help = "Fund value before the rebalance")]
    pub fund: f64,
    #[arg(long)]
    pub year: i32,
    #[arg(
        long = "alloc",
        value_parser = parse_allocation,
        help = "STRATEGY=PERCENT, repeatable, e.g. --alloc google=60 --alloc ea=40"
    )]
    pub allocations: Vec<(Strategy, f64)>,
    #[command(flatten)]
    pub table: RiskTableArgs,
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[arg(long, help = "Amount at the start of the projection")]
    pub start: f64,
    #[arg(long)]
    pub strategy: Strategy,
    #[command(flatten)]
    pub table: RiskTableArgs,
}

fn parse_allocation(raw: &str) -> Result<(Strategy, f64), String> {
    let (name, percent) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected STRATEGY=PERCENT, got '{raw}'"))?;
    let strategy = name.parse::<Strategy>().map_err(|e| e.to_string())?;
    let percent = percent
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{percent}' is not a percentage"))?;
    if !percent.is_finite() {
        return Err(format!("'{percent}' is not a percentage"));
    }
    Ok((strategy, percent))
}

impl RiskTableArgs {
    pub fn load(&self) -> Result<InMemoryRiskTable, SimError> {
        let table = match &self.risk_table {
            Some(path) => InMemoryRiskTable::from_path(path)?,
            None => InMemoryRiskTable::embedded()?,
        };
        if table.is_empty() {
            warn!("risk table is empty; every rebalance will keep the fund unchanged");
        } else {
            info!(
                "loaded {} risk records covering {} years",
                table.len(),
                table.years().len()
            );
        }
        Ok(table)
    }
}

pub fn run_rebalance(args: &RebalanceArgs) -> Result<Rebalance, SimError> {
    let fund = validate_fund("fund", args.fund)?;
    let year = validate_year(f64::from(args.year))?;
    let allocations: AllocationSet = args.allocations.iter().copied().collect();
    let table = args.table.load()?;
    Ok(compute_rebalance(
        fund,
        year,
        &allocations,
        &table.find_by_year(year),
    ))
}

pub fn run_projection(args: &ProjectArgs) -> Result<Vec<HistoryPoint>, SimError> {
    let start = validate_fund("start", args.start)?;
    let table = args.table.load()?;
    Ok(project_strategy(start, &table.find_by_strategy(args.strategy)))
}

pub async fn run(cli: Cli) -> Result<(), SimError> {
    match cli.command {
        Command::Serve(args) => {
            let initial_fund = validate_fund("initial-fund", args.initial_fund)?;
            let table = args.table.load()?;
            let state = AppState::new(Arc::new(table), initial_fund);
            run_http_server(args.port, state).await?;
        }
        Command::Rebalance(args) => {
            let outcome = run_rebalance(&args)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Project(args) => {
            let points = run_projection(&args)?;
            println!("{}", serde_json::to_string_pretty(&points)?);
        }
    }
    Ok(())
}
