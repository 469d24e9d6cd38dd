use super::super::aggregator::CustomerAggregator;
use super::super::domain::OrderRecord;
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

/// Sales for one calendar month, over valid orders only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySales {
    /// `YYYY-MM`.
    pub month: String,
    pub revenue: f64,
    pub orders: usize,
    pub average_order_value: f64,
    pub returns: usize,
    pub return_rate: f64,
    /// Change against the previous month as a fraction; absent when that month sold nothing.
    pub revenue_growth: Option<f64>,
    pub order_growth: Option<f64>,
}

/// Month-by-month sales from the earliest to the latest valid order.
///
/// Cancelled orders and sample or drop-ship items are left out, the same way
/// they are kept out of customer aggregation. Months without sales inside the
/// span are listed with zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyReport {
    pub months: Vec<MonthlySales>,
    pub total_revenue: f64,
    pub total_orders: usize,
    pub total_returns: usize,
    pub average_order_value: f64,
    pub return_rate: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct MonthTally {
    revenue: f64,
    orders: usize,
    returns: usize,
}

impl MonthlyReport {
    pub fn from_orders(orders: &[OrderRecord], excluded_item_keywords: &[String]) -> Self {
        let aggregator = CustomerAggregator::new(excluded_item_keywords);
        let mut tallies: BTreeMap<(i32, u32), MonthTally> = BTreeMap::new();
        for order in orders {
            if order.is_cancelled() || aggregator.is_excluded_item(order) {
                continue;
            }
            let date = order.order_date;
            let tally = tallies.entry((date.year(), date.month())).or_default();
            tally.revenue += order.gross_revenue;
            tally.orders += 1;
            if order.is_return() {
                tally.returns += 1;
            }
        }

        let (Some(first), Some(last)) = (
            tallies.keys().next().copied(),
            tallies.keys().next_back().copied(),
        ) else {
            return Self::default();
        };

        let mut months = Vec::new();
        let mut previous: Option<MonthTally> = None;
        let mut cursor = first;
        while cursor <= last {
            let tally = tallies.get(&cursor).copied().unwrap_or_default();
            months.push(MonthlySales {
                month: format!("{}-{:02}", cursor.0, cursor.1),
                revenue: tally.revenue,
                orders: tally.orders,
                average_order_value: ratio(tally.revenue, tally.orders as f64),
                returns: tally.returns,
                return_rate: ratio(tally.returns as f64, tally.orders as f64),
                revenue_growth: previous.and_then(|prev| growth(prev.revenue, tally.revenue)),
                order_growth: previous
                    .and_then(|prev| growth(prev.orders as f64, tally.orders as f64)),
            });
            previous = Some(tally);
            cursor = next_month(cursor);
        }

        let total_revenue: f64 = months.iter().map(|month| month.revenue).sum();
        let total_orders: usize = months.iter().map(|month| month.orders).sum();
        let total_returns: usize = months.iter().map(|month| month.returns).sum();
        Self {
            months,
            total_revenue,
            total_orders,
            total_returns,
            average_order_value: ratio(total_revenue, total_orders as f64),
            return_rate: ratio(total_returns as f64, total_orders as f64),
        }
    }

    /// Month with the highest revenue; earlier months win ties.
    pub fn best_month(&self) -> Option<&MonthlySales> {
        self.months
            .iter()
            .filter(|month| month.orders > 0)
            .fold(None, |best: Option<&MonthlySales>, month| match best {
                Some(current) if current.revenue >= month.revenue => Some(current),
                _ => Some(month),
            })
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn growth(previous: f64, current: f64) -> Option<f64> {
    (previous > 0.0).then(|| (current - previous) / previous)
}

fn next_month((year, month): (i32, u32)) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}
