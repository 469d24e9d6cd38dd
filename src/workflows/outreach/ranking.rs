use super::domain::CustomerRecord;
use std::cmp::Ordering;

/// Orders the action list: priority score, then valid orders, then blended
/// return rate (lower first), then average order value, then first-seen order.
///
/// The last key is unique per customer, so the order is total and stable
/// across runs over the same input.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingSort;

impl RankingSort {
    pub fn compare(a: &CustomerRecord, b: &CustomerRecord) -> Ordering {
        b.score()
            .total_cmp(&a.score())
            .then_with(|| b.profile.valid_orders.cmp(&a.profile.valid_orders))
            .then_with(|| a.metrics.return_rate.total_cmp(&b.metrics.return_rate))
            .then_with(|| {
                b.metrics
                    .average_order_value
                    .total_cmp(&a.metrics.average_order_value)
            })
            .then_with(|| a.profile.sequence.cmp(&b.profile.sequence))
    }

    /// Sorts `selected` indices into `customers` in place.
    pub fn sort(customers: &[CustomerRecord], selected: &mut [usize]) {
        selected.sort_by(|a, b| Self::compare(&customers[*a], &customers[*b]));
    }
}
