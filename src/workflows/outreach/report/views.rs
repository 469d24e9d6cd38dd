use super::super::domain::{
    CustomerKey, CustomerRecord, CustomerTag, GrowthType, PriorityBucket, ScoreBreakdown,
    ValueTier,
};
use super::super::pipeline::PipelineOutcome;
use super::monthly::MonthlyReport;
use super::summary::RunSummary;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCount {
    pub bucket: PriorityBucket,
    pub bucket_label: &'static str,
    pub customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCount {
    pub tier: ValueTier,
    pub tier_label: &'static str,
    pub customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagCount {
    pub tag: CustomerTag,
    pub tag_label: &'static str,
    pub customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExclusionCount {
    pub reason: &'static str,
    pub customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagView {
    pub tag: CustomerTag,
    pub label: &'static str,
}

/// Flattened customer row handed to the export layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    pub key: CustomerKey,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub valid_orders: u32,
    pub cancelled_orders: u32,
    pub returned_orders: u32,
    pub total_payment: f64,
    pub average_order_value: f64,
    pub first_order: Option<NaiveDate>,
    pub last_order: Option<NaiveDate>,
    pub days_since_last_order: Option<i64>,
    pub churn_threshold_days: f64,
    pub platform: Option<String>,
    pub preferred_item: Option<String>,
    pub category: Option<String>,
    pub return_rate: f64,
    pub clv_score: f64,
    pub value_tier: ValueTier,
    pub value_tier_label: &'static str,
    pub growth_type: GrowthType,
    pub growth_label: &'static str,
    pub priority_score: f64,
    pub bucket: PriorityBucket,
    pub bucket_label: &'static str,
    pub tags: Vec<TagView>,
    pub breakdown: ScoreBreakdown,
}

impl CustomerView {
    pub fn from_record(record: &CustomerRecord, rank: Option<usize>) -> Self {
        let profile = &record.profile;
        let metrics = &record.metrics;
        let assessment = &record.assessment;
        Self {
            rank,
            key: profile.key.clone(),
            name: profile.name.clone(),
            phone: profile.phone.clone(),
            address: profile.address.clone(),
            valid_orders: profile.valid_orders,
            cancelled_orders: profile.cancelled_orders,
            returned_orders: profile.returned_orders,
            total_payment: profile.total_payment,
            average_order_value: metrics.average_order_value,
            first_order: profile.first_order,
            last_order: profile.last_order,
            days_since_last_order: metrics.days_since_last_order,
            churn_threshold_days: assessment.churn_threshold_days,
            platform: profile.dominant_platform.clone(),
            preferred_item: profile.preferred_item.clone(),
            category: record.params.category.clone(),
            return_rate: metrics.return_rate,
            clv_score: metrics.clv.score,
            value_tier: metrics.value_tier,
            value_tier_label: metrics.value_tier.label(),
            growth_type: metrics.growth_type,
            growth_label: metrics.growth_type.label(),
            priority_score: assessment.score,
            bucket: assessment.bucket,
            bucket_label: assessment.bucket.label(),
            tags: assessment
                .tags
                .iter()
                .map(|tag| TagView {
                    tag: *tag,
                    label: tag.label(),
                })
                .collect(),
            breakdown: assessment.breakdown.clone(),
        }
    }
}

/// Everything a run produces, ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionReport {
    pub summary: RunSummary,
    pub actions: Vec<CustomerView>,
    pub overview: Vec<CustomerView>,
    pub monthly: MonthlyReport,
}

impl ActionReport {
    pub fn from_outcome(outcome: &PipelineOutcome) -> Self {
        Self {
            summary: outcome.summary(),
            actions: outcome
                .action_list()
                .enumerate()
                .map(|(position, record)| CustomerView::from_record(record, Some(position + 1)))
                .collect(),
            overview: outcome
                .overview()
                .iter()
                .map(|record| CustomerView::from_record(record, None))
                .collect(),
            monthly: outcome.monthly.clone(),
        }
    }
}
