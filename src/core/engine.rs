use super::types::{AllocationSet, HistoryPoint, PortfolioState, Rebalance, RiskRecord};

/// Year whose closing fund seeds the level-two strategy projections.
pub const PROJECTION_SEED_YEAR: i32 = 5;

/// Rounds to the nearest integer, with halves going towards positive infinity
/// (`-2.5` becomes `-2`, `2.5` becomes `3`).
pub fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

/// Percentage change from `base` to `value`, rounded to two decimals.
/// A zero base reports no growth.
pub fn growth_percent(base: f64, value: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    round_half_up(((value - base) / base) * 100.0 * 100.0) / 100.0
}

/// Gain or loss on `amount` for one strategy-year, floored towards negative
/// infinity so that fractional losses round against the holder.
fn floored_gain(gain_percent: f64, amount: f64) -> f64 {
    (gain_percent / 100.0 * amount).floor()
}

/// Blends one year of strategy returns over the allocated fund.
///
/// Each record contributes `invested + floor(gain% * invested)`, where
/// `invested = current_fund * weight / 100`. Records for strategies with no
/// allocation, or for a different year, contribute nothing. When no record
/// applies the fund is returned unchanged.
pub fn compute_rebalance(
    current_fund: f64,
    year: i32,
    allocations: &AllocationSet,
    records: &[RiskRecord],
) -> Rebalance {
    let mut applicable = records.iter().filter(|r| r.year == year).peekable();
    if applicable.peek().is_none() {
        return Rebalance {
            new_fund: current_fund,
            growth: 0.0,
        };
    }

    let mut blended_value = 0.0;
    for record in applicable {
        let Some(weight) = allocations.weight(record.strategy) else {
            continue;
        };
        let invested = current_fund * weight / 100.0;
        blended_value += invested + floored_gain(record.gain_percent, invested);
    }

    let total_increase = blended_value - current_fund;
    let new_fund = round_half_up(total_increase + current_fund);
    Rebalance {
        new_fund,
        growth: growth_percent(current_fund, new_fund),
    }
}

/// Year-over-year compounding of a single amount through a strategy's
/// returns. Yields the origin point first, then one point per record with `x`
/// counting records rather than calendar years.
#[derive(Debug, Clone)]
pub struct Projection<'a> {
    records: std::slice::Iter<'a, RiskRecord>,
    running: f64,
    position: i32,
    origin_pending: bool,
}

impl<'a> Projection<'a> {
    pub fn new(start_amount: f64, records: &'a [RiskRecord]) -> Self {
        Self {
            records: records.iter(),
            running: start_amount,
            position: 0,
            origin_pending: true,
        }
    }
}

impl Iterator for Projection<'_> {
    type Item = HistoryPoint;

    fn next(&mut self) -> Option<HistoryPoint> {
        if self.origin_pending {
            self.origin_pending = false;
            return Some(HistoryPoint::origin(self.running));
        }

        let record = self.records.next()?;
        let previous = self.running;
        self.running = previous + floored_gain(record.gain_percent, previous);
        self.position += 1;
        Some(HistoryPoint {
            x: self.position,
            y: self.running,
            strategy: Some(record.strategy),
            previous_year: Some(previous),
            growth: None,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.records.len() + usize::from(self.origin_pending);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Projection<'_> {}

/// Eager form of [`Projection`]. `records` must already be filtered to one
/// strategy and sorted by ascending year.
pub fn project_strategy(start_amount: f64, records: &[RiskRecord]) -> Vec<HistoryPoint> {
    Projection::new(start_amount, records).collect()
}

impl PortfolioState {
    pub fn new(initial_fund: f64) -> Self {
        Self {
            initial_fund,
            current_fund: initial_fund,
            previous_fund: None,
            year: 0,
            year5_amt: 0.0,
            history: vec![HistoryPoint::origin(initial_fund)],
        }
    }

    /// Records the outcome of a rebalance of `invested_fund` in `year` and
    /// appends its history point.
    pub fn apply_rebalance(&mut self, invested_fund: f64, year: i32, outcome: Rebalance) {
        self.previous_fund = Some(invested_fund);
        self.current_fund = outcome.new_fund;
        self.year = year;
        if year == PROJECTION_SEED_YEAR {
            self.year5_amt = outcome.new_fund;
        }
        self.history.push(HistoryPoint {
            x: year,
            y: outcome.new_fund,
            strategy: None,
            previous_year: Some(invested_fund),
            growth: Some(outcome.growth),
        });
    }
}
