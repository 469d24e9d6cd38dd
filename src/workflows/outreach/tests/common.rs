use chrono::{Duration, NaiveDate};

use crate::workflows::outreach::domain::{CustomerRecord, OrderRecord};
use crate::workflows::outreach::{
    BusinessConfig, CustomerAggregator, MetricEngine, PriorityScorer, RunOptions,
};

pub(super) const CONFIG: &str = r#"{
    "defaults": {
        "gross_margin": 0.4,
        "category_cycle_days": 90,
        "expected_return_rate": 0.1,
        "touch_cost": 5
    },
    "categories": {
        "dress": { "aliases": ["连衣裙", "dress"], "category_cycle_days": 60 },
        "coat": { "aliases": ["大衣", "coat"], "gross_margin": 0.5 }
    },
    "platform_touch_cost": { "抖音": 8 }
}"#;

pub(super) fn config() -> BusinessConfig {
    BusinessConfig::from_json_str(CONFIG).expect("fixture config is valid")
}

pub(super) fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 12).expect("valid date")
}

pub(super) fn days_ago(days: i64) -> NaiveDate {
    run_date() - Duration::days(days)
}

pub(super) fn options(config: &BusinessConfig) -> RunOptions {
    RunOptions::from_config(config, run_date())
}

/// Uncosted order for an unmatched item, so category defaults apply.
pub(super) fn order(phone: &str, days: i64, revenue: f64) -> OrderRecord {
    OrderRecord {
        phone: Some(phone.to_string()),
        name: Some(format!("customer {phone}")),
        address: None,
        order_date: days_ago(days),
        gross_revenue: revenue,
        payment_amount: None,
        refund_amount: 0.0,
        refund_type: None,
        refund_status: None,
        order_status: None,
        platform: None,
        category: None,
        item_name: Some("misc goods".to_string()),
        tracking_number: None,
    }
}

pub(super) fn returned(mut order: OrderRecord) -> OrderRecord {
    order.refund_amount = order.gross_revenue;
    order.refund_type = Some("退货退款".to_string());
    order
}

pub(super) fn scored(
    config: &BusinessConfig,
    orders: &[OrderRecord],
    options: &RunOptions,
) -> Vec<CustomerRecord> {
    let aggregation = CustomerAggregator::new(&config.defaults.excluded_item_keywords).aggregate(orders);
    let measured = MetricEngine::new(config, options.run_date).measure(aggregation.profiles);
    PriorityScorer::new(config, options).score_all(measured)
}

pub(super) fn find<'r>(records: &'r [CustomerRecord], phone: &str) -> &'r CustomerRecord {
    records
        .iter()
        .find(|record| record.key().0 == phone)
        .unwrap_or_else(|| panic!("customer {phone} missing from overview"))
}
