//! Customer outreach prioritisation: aggregation, metrics, scoring, filtering and ranking
//! over an in-memory order set.

mod aggregator;
pub mod config;
pub mod domain;
mod filter;
mod identity;
mod metrics;
mod options;
mod pipeline;
mod ranking;
pub mod report;
mod resolver;
mod scoring;

pub use aggregator::{Aggregation, CustomerAggregator};
pub use config::{BusinessConfig, BusinessConfigError};
pub use domain::{
    ContactLog, CooldownSource, CustomerKey, CustomerRecord, CustomerTag, OrderRecord,
    PriorityBucket,
};
pub use filter::{churn_threshold_days, ActionFilter, Exclusion, ExclusionReason, FilterOutcome};
pub use identity::{identity_key, normalize_phone};
pub use metrics::{blended_return_rate, MeasuredCustomer, MetricEngine};
pub use options::{AnniversaryWindow, AnniversaryWindowParseError, RunOptions};
pub use pipeline::{OutreachPipeline, PipelineOutcome};
pub use ranking::RankingSort;
pub use report::{ActionReport, CustomerView, MonthlyReport, MonthlySales, RunSummary};
pub use resolver::ConfigResolver;
pub use scoring::PriorityScorer;

#[cfg(test)]
mod tests;
