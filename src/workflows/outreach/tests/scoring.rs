use super::common::*;
use crate::workflows::outreach::domain::{CustomerTag, GrowthType, MarginSource, PriorityBucket};
use crate::workflows::outreach::PriorityScorer;

#[test]
fn single_order_score_is_dampened() {
    let config = config();
    let options = options(&config);
    let mut first = order("13800000001", 60, 500.0);
    first.payment_amount = Some(300.0);
    first.item_name = Some("dress".to_string());

    let records = scored(&config, &[first], &options);
    let record = &records[0];
    let breakdown = &record.assessment.breakdown;

    assert_eq!(record.params.category.as_deref(), Some("dress"));
    assert_eq!(record.metrics.margin_source, MarginSource::GrossProfit);
    assert_eq!(breakdown.confidence_weight, 0.3);
    assert_eq!(breakdown.touch_cost, 5.0);
    assert!((breakdown.uplift - 0.1).abs() < 1e-9);
    assert!((breakdown.return_rate - 0.1).abs() < 1e-9);
    // 0.1 * 200 * 0.9 * 0.3 - 5
    assert!((breakdown.base_score - 0.4).abs() < 1e-9);
    // A lone customer has no spread to rank against, so it is not a star.
    assert!(record.metrics.clv.score < config.tags.star_min_clv);
    assert!(!record.has_tag(CustomerTag::Star));
    assert!(breakdown.boosts.is_empty());
    assert!((record.score() - 0.4).abs() < 1e-9);
    assert_eq!(record.assessment.bucket, PriorityBucket::Low);
}

#[test]
fn score_matches_its_breakdown() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        order("13800000001", 300, 1500.0),
        order("13800000001", 150, 1200.0),
        returned(order("13800000002", 40, 90.0)),
        order("13800000003", 10, 20.0),
    ];

    for record in scored(&config, &orders, &options) {
        let breakdown = &record.assessment.breakdown;
        let expected_base = breakdown.uplift
            * breakdown.estimated_margin
            * (1.0 - breakdown.return_rate)
            * breakdown.confidence_weight
            - breakdown.touch_cost;
        let boosts: f64 = breakdown.boosts.iter().map(|boost| boost.points).sum();
        assert!((breakdown.base_score - expected_base).abs() < 1e-9);
        assert!((record.score() - (breakdown.base_score + boosts)).abs() < 1e-9);
        assert_eq!(
            record.assessment.bucket,
            PriorityBucket::from_score(record.score())
        );
    }
}

#[test]
fn churn_tags_follow_the_threshold() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        order("13800000001", 200, 100.0),
        order("13800000002", 100, 100.0),
        order("13800000003", 30, 100.0),
    ];

    let records = scored(&config, &orders, &options);

    let long = find(&records, "13800000001");
    assert_eq!(long.assessment.churn_threshold_days, 135.0);
    assert!(long.has_tag(CustomerTag::ChurnRiskLongTerm));
    assert!(!long.has_tag(CustomerTag::ChurnRiskShortTerm));

    let short = find(&records, "13800000002");
    assert!(short.has_tag(CustomerTag::ChurnRiskShortTerm));
    assert!(!short.has_tag(CustomerTag::ChurnRiskLongTerm));

    let active = find(&records, "13800000003");
    assert!(!active.has_tag(CustomerTag::ChurnRiskShortTerm));
    assert!(!active.has_tag(CustomerTag::ChurnRiskLongTerm));
}

#[test]
fn spend_drop_and_return_spike_tags() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        order("13800000001", 90, 400.0),
        order("13800000001", 60, 400.0),
        order("13800000001", 30, 100.0),
        order("13800000002", 90, 200.0),
        returned(order("13800000002", 60, 200.0)),
        returned(order("13800000002", 30, 200.0)),
    ];

    let records = scored(&config, &orders, &options);

    let dropping = find(&records, "13800000001");
    assert!(dropping.has_tag(CustomerTag::SpendDrop));
    assert!(!dropping.has_tag(CustomerTag::ReturnSpike));

    let returning = find(&records, "13800000002");
    assert!(returning.has_tag(CustomerTag::ReturnSpike));
    assert!(!returning.has_tag(CustomerTag::SpendDrop));
}

#[test]
fn order_count_boost_applies_at_ten_orders() {
    let config = config();
    let options = options(&config);
    let orders: Vec<_> = (0..10)
        .map(|index| order("13800000001", 40 + index * 20, 150.0))
        .collect();

    let records = scored(&config, &orders, &options);
    let boosts = &records[0].assessment.breakdown.boosts;

    assert_eq!(records[0].profile.valid_orders, 10);
    assert!(boosts.iter().any(|boost| boost.rule == "loyal_ten_orders"));
}

#[test]
fn assessment_is_deterministic() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        order("13800000001", 200, 640.0),
        order("13800000001", 120, 380.0),
        order("13800000002", 35, 90.0),
    ];

    let first = scored(&config, &orders, &options);
    let second = scored(&config, &orders, &options);
    assert_eq!(first, second);

    let scorer = PriorityScorer::new(&config, &options);
    for record in &first {
        let again = scorer.assess(&record.profile, &record.params, &record.metrics);
        assert_eq!(again, record.assessment);
    }
}

#[test]
fn overdue_repeat_customers_reach_the_premium_uplift_ceiling() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        // Three clean orders, ten days apart, long overdue.
        order("13800000001", 400, 200.0),
        order("13800000001", 390, 200.0),
        order("13800000001", 380, 200.0),
        // Two orders only.
        order("13800000002", 400, 200.0),
        order("13800000002", 380, 200.0),
        // Three orders, but mostly returned.
        order("13800000003", 400, 200.0),
        returned(order("13800000003", 390, 200.0)),
        returned(order("13800000003", 380, 200.0)),
    ];

    let records = scored(&config, &orders, &options);

    let premium = find(&records, "13800000001");
    assert!(premium.metrics.return_rate < config.uplift.premium_max_return_rate);
    assert!(premium.metrics.uplift_ratio > 10.0);
    assert_eq!(premium.assessment.breakdown.uplift, 0.45);

    let thin = find(&records, "13800000002");
    assert!(thin.metrics.uplift_ratio > 10.0);
    assert_eq!(thin.assessment.breakdown.uplift, 0.3);

    let returning = find(&records, "13800000003");
    assert!(returning.metrics.return_rate >= config.uplift.premium_max_return_rate);
    assert_eq!(returning.assessment.breakdown.uplift, 0.3);
}

#[test]
fn high_value_active_needs_high_tier_within_cadence() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        order("13800000001", 90, 3000.0),
        order("13800000002", 91, 3000.0),
        order("13800000003", 40, 2999.0),
    ];

    let records = scored(&config, &orders, &options);

    let at_cadence = find(&records, "13800000001");
    assert_eq!(at_cadence.metrics.repurchase_threshold_days, 90.0);
    assert!(at_cadence.has_tag(CustomerTag::HighValueActive));

    assert!(!find(&records, "13800000002").has_tag(CustomerTag::HighValueActive));
    assert!(!find(&records, "13800000003").has_tag(CustomerTag::HighValueActive));
}

#[test]
fn anniversary_tag_uses_the_lead_window() {
    let config = config();
    let options = options(&config);
    assert_eq!(config.tags.anniversary_lead_days, 7);
    let orders = vec![
        // Anniversaries fall 7 and 8 days after the run date.
        order("13800000001", 358, 100.0),
        order("13800000002", 357, 100.0),
    ];

    let records = scored(&config, &orders, &options);

    assert!(find(&records, "13800000001").has_tag(CustomerTag::Anniversary));
    assert!(!find(&records, "13800000002").has_tag(CustomerTag::Anniversary));
}

#[test]
fn potential_tag_marks_promising_new_customers() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        order("13800000001", 30, 300.0),
        order("13800000002", 30, 299.0),
    ];

    let records = scored(&config, &orders, &options);

    let promising = find(&records, "13800000001");
    assert_eq!(promising.metrics.growth_type, GrowthType::HighPotentialNew);
    assert!(promising.has_tag(CustomerTag::Potential));
    assert!(!promising.has_tag(CustomerTag::Star));

    let ordinary = find(&records, "13800000002");
    assert_eq!(ordinary.metrics.growth_type, GrowthType::New);
    assert!(ordinary.metrics.clv.score < config.tags.potential_min_clv);
    assert!(!ordinary.has_tag(CustomerTag::Potential));
}

#[test]
fn growing_tag_needs_a_rising_spend_trend() {
    let config = config();
    let options = options(&config);
    let orders = vec![
        order("13800000001", 90, 100.0),
        order("13800000001", 60, 200.0),
        order("13800000001", 30, 300.0),
        order("13800000002", 90, 100.0),
        order("13800000002", 60, 105.0),
        order("13800000002", 30, 110.0),
    ];

    let records = scored(&config, &orders, &options);

    let rising = find(&records, "13800000001");
    assert_eq!(rising.metrics.growth_type, GrowthType::Growing);
    assert!(rising.has_tag(CustomerTag::Growing));

    let flat = find(&records, "13800000002");
    assert!(flat.metrics.spend_trend < config.growth.trend_threshold);
    assert_eq!(flat.metrics.growth_type, GrowthType::Stable);
    assert!(!flat.has_tag(CustomerTag::Growing));
}
