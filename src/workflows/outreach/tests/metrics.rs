use super::common::*;
use crate::workflows::outreach::domain::{GrowthType, MarginSource};

#[test]
fn derived_metrics_stay_within_bounds() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        order("13800000001", 400, 120.0),
        order("13800000001", 20, 980.0),
        returned(order("13800000002", 10, 60.0)),
        returned(order("13800000002", 5, 60.0)),
        order("13800000003", 700, 5200.0),
        order("13800000004", 3, 45.0),
        order("13800000004", 2, 45.0),
        order("13800000004", 1, 45.0),
        returned(order("13800000004", 0, 45.0)),
    ];

    let records = scored(&config, &orders, &options);
    assert_eq!(records.len(), 4);

    for record in &records {
        let metrics = &record.metrics;
        assert!((0.0..=0.95).contains(&metrics.return_rate), "{metrics:?}");
        assert!(metrics.uplift >= config.uplift.floor, "{metrics:?}");
        assert!(metrics.uplift <= metrics.uplift_ceiling, "{metrics:?}");
        assert!((0.0..=100.0).contains(&metrics.clv.score), "{metrics:?}");
        assert!(metrics.estimated_margin >= 0.0);
        assert!(metrics.estimated_margin <= record.params.max_estimated_margin);
    }
}

#[test]
fn margin_prefers_recorded_profit_over_category_margin() {
    let config = config();
    let options = options(&config);
    let mut costed = order("13800000001", 40, 200.0);
    costed.payment_amount = Some(120.0);
    let mut second = order("13800000001", 20, 200.0);
    second.payment_amount = Some(120.0);
    let orders = vec![costed, second, order("13800000002", 20, 300.0)];

    let records = scored(&config, &orders, &options);

    let profit_based = find(&records, "13800000001");
    assert_eq!(profit_based.metrics.margin_source, MarginSource::GrossProfit);
    assert!((profit_based.metrics.estimated_margin - 80.0).abs() < 1e-9);

    let category_based = find(&records, "13800000002");
    assert_eq!(category_based.metrics.margin_source, MarginSource::CategoryMargin);
    assert!((category_based.metrics.estimated_margin - 120.0).abs() < 1e-9);
}

#[test]
fn same_day_orders_fall_back_to_category_cycle() {
    let config = config();
    let options = options(&config);
    let orders = vec![order("13800000001", 30, 100.0), order("13800000001", 30, 100.0)];

    let records = scored(&config, &orders, &options);
    let metrics = &records[0].metrics;

    assert_eq!(metrics.personal_gap_days, None);
    assert_eq!(metrics.repurchase_threshold_days, 90.0);
    assert!(metrics.uplift.is_finite());
}

#[test]
fn cancelled_only_customer_is_kept_with_neutral_metrics() {
    let config = config();
    let options = options(&config);
    let mut cancelled = order("13800000009", 15, 300.0);
    cancelled.order_status = Some("交易取消".to_string());
    let orders = vec![cancelled, order("13800000001", 15, 300.0)];

    let records = scored(&config, &orders, &options);
    assert_eq!(records.len(), 2);

    let inactive = find(&records, "13800000009");
    assert_eq!(inactive.profile.valid_orders, 0);
    assert_eq!(inactive.metrics.days_since_last_order, None);
    assert_eq!(inactive.metrics.uplift, config.uplift.floor);
    assert_eq!(inactive.metrics.estimated_margin, 0.0);
    assert_eq!(inactive.metrics.clv.score, 0.0);
    assert_eq!(inactive.metrics.growth_type, GrowthType::Inactive);
    assert!(inactive.assessment.tags.is_empty());
}

#[test]
fn clv_ranks_the_strongest_history_highest() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        order("13800000001", 300, 100.0),
        order("13800000002", 90, 800.0),
        order("13800000002", 60, 900.0),
        order("13800000002", 30, 1000.0),
    ];

    let records = scored(&config, &orders, &options);
    let weak = find(&records, "13800000001");
    let strong = find(&records, "13800000002");

    assert_eq!(strong.metrics.clv.historical, 1.0);
    assert_eq!(weak.metrics.clv.historical, 0.0);
    assert!(strong.metrics.clv.score > weak.metrics.clv.score);
    assert_eq!(strong.metrics.growth_type, GrowthType::Growing);
}
