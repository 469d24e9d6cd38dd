use super::aggregator::CustomerAggregator;
use super::config::BusinessConfig;
use super::domain::{CooldownSource, CustomerRecord, OrderRecord};
use super::filter::{ActionFilter, Exclusion};
use super::metrics::MetricEngine;
use super::options::RunOptions;
use super::ranking::RankingSort;
use super::report::{MonthlyReport, RunSummary};
use super::scoring::PriorityScorer;
use chrono::NaiveDate;
use tracing::{info, warn};

/// Runs aggregation, measurement, scoring, filtering and ranking over one order set.
pub struct OutreachPipeline<'a> {
    config: &'a BusinessConfig,
}

/// Result of one run. `customers` is the overview in first-seen order;
/// `action_order` indexes into it, already ranked and capped.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_date: NaiveDate,
    pub order_count: usize,
    pub orders_without_identity: usize,
    pub excluded_item_orders: usize,
    pub customers: Vec<CustomerRecord>,
    pub action_order: Vec<usize>,
    pub exclusions: Vec<Exclusion>,
    /// Ranked customers dropped by `max_action_count`.
    pub truncated: usize,
    pub cooldown_applied: bool,
    pub monthly: MonthlyReport,
}

impl<'a> OutreachPipeline<'a> {
    pub fn new(config: &'a BusinessConfig) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        orders: &[OrderRecord],
        cooldown: &CooldownSource,
        options: &RunOptions,
    ) -> PipelineOutcome {
        let aggregation =
            CustomerAggregator::new(&self.config.defaults.excluded_item_keywords).aggregate(orders);
        info!(
            orders = orders.len(),
            customers = aggregation.profiles.len(),
            "orders aggregated"
        );

        let measured =
            MetricEngine::new(self.config, options.run_date).measure(aggregation.profiles);
        let customers = PriorityScorer::new(self.config, options).score_all(measured);

        if let CooldownSource::Unavailable { reason } = cooldown {
            warn!(%reason, "contact log unavailable, cooldown rule skipped");
        }

        let filter = ActionFilter::new(&self.config.filters, &self.config.single_order, options);
        let outcome = filter.apply(&customers, cooldown);

        let mut action_order = outcome.selected;
        RankingSort::sort(&customers, &mut action_order);

        let mut truncated = 0;
        if let Some(limit) = options.max_action_count {
            truncated = action_order.len().saturating_sub(limit);
            action_order.truncate(limit);
        }

        info!(
            customers = customers.len(),
            actions = action_order.len(),
            excluded = outcome.exclusions.len(),
            truncated,
            "action list ranked"
        );

        let monthly =
            MonthlyReport::from_orders(orders, &self.config.defaults.excluded_item_keywords);

        PipelineOutcome {
            run_date: options.run_date,
            order_count: orders.len(),
            orders_without_identity: aggregation.orders_without_identity,
            excluded_item_orders: aggregation.excluded_item_orders,
            customers,
            action_order,
            exclusions: outcome.exclusions,
            truncated,
            cooldown_applied: outcome.cooldown_applied,
            monthly,
        }
    }
}

impl PipelineOutcome {
    /// Every customer, unfiltered, in first-seen order.
    pub fn overview(&self) -> &[CustomerRecord] {
        &self.customers
    }

    /// Filtered, ranked customers, borrowing the same records as the overview.
    pub fn action_list(&self) -> impl Iterator<Item = &CustomerRecord> + '_ {
        self.action_order.iter().map(|index| &self.customers[*index])
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_outcome(self)
    }
}
