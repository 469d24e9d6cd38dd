use super::super::domain::{CustomerRecord, CustomerTag, PriorityBucket, ValueTier};
use super::super::filter::Exclusion;
use super::super::pipeline::PipelineOutcome;
use super::views::{BucketCount, ExclusionCount, TagCount, TierCount};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Aggregate counts for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_date: NaiveDate,
    pub order_count: usize,
    pub orders_without_identity: usize,
    pub excluded_item_orders: usize,
    pub customer_count: usize,
    pub action_count: usize,
    pub truncated: usize,
    pub cooldown_applied: bool,
    pub buckets: Vec<BucketCount>,
    pub value_tiers: Vec<TierCount>,
    pub tags: Vec<TagCount>,
    pub exclusions: Vec<ExclusionCount>,
}

impl RunSummary {
    pub fn from_outcome(outcome: &PipelineOutcome) -> Self {
        let customers = outcome.overview();
        Self {
            run_date: outcome.run_date,
            order_count: outcome.order_count,
            orders_without_identity: outcome.orders_without_identity,
            excluded_item_orders: outcome.excluded_item_orders,
            customer_count: customers.len(),
            action_count: outcome.action_order.len(),
            truncated: outcome.truncated,
            cooldown_applied: outcome.cooldown_applied,
            buckets: bucket_counts(customers),
            value_tiers: tier_counts(customers),
            tags: tag_counts(customers),
            exclusions: exclusion_counts(&outcome.exclusions),
        }
    }

    pub fn customers_in(&self, bucket: PriorityBucket) -> usize {
        self.buckets
            .iter()
            .find(|entry| entry.bucket == bucket)
            .map(|entry| entry.customers)
            .unwrap_or(0)
    }

    pub fn excluded_for(&self, reason: &str) -> usize {
        self.exclusions
            .iter()
            .find(|entry| entry.reason == reason)
            .map(|entry| entry.customers)
            .unwrap_or(0)
    }
}

fn bucket_counts(customers: &[CustomerRecord]) -> Vec<BucketCount> {
    let mut counts: HashMap<PriorityBucket, usize> = HashMap::new();
    for customer in customers {
        *counts.entry(customer.assessment.bucket).or_default() += 1;
    }
    PriorityBucket::ordered()
        .into_iter()
        .map(|bucket| BucketCount {
            bucket,
            bucket_label: bucket.label(),
            customers: counts.get(&bucket).copied().unwrap_or(0),
        })
        .collect()
}

fn tier_counts(customers: &[CustomerRecord]) -> Vec<TierCount> {
    let mut counts: HashMap<ValueTier, usize> = HashMap::new();
    for customer in customers {
        *counts.entry(customer.metrics.value_tier).or_default() += 1;
    }
    ValueTier::ordered()
        .into_iter()
        .map(|tier| TierCount {
            tier,
            tier_label: tier.label(),
            customers: counts.get(&tier).copied().unwrap_or(0),
        })
        .collect()
}

fn tag_counts(customers: &[CustomerRecord]) -> Vec<TagCount> {
    CustomerTag::ordered()
        .into_iter()
        .filter_map(|tag| {
            let customers = customers.iter().filter(|c| c.has_tag(tag)).count();
            (customers > 0).then_some(TagCount {
                tag,
                tag_label: tag.label(),
                customers,
            })
        })
        .collect()
}

fn exclusion_counts(exclusions: &[Exclusion]) -> Vec<ExclusionCount> {
    let mut counts: Vec<ExclusionCount> = Vec::new();
    for exclusion in exclusions {
        let reason = exclusion.reason.code();
        match counts.iter_mut().find(|entry| entry.reason == reason) {
            Some(entry) => entry.customers += 1,
            None => counts.push(ExclusionCount {
                reason,
                customers: 1,
            }),
        }
    }
    counts
}
