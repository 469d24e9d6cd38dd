use super::domain::{
    CategoryShare, CustomerKey, CustomerProfile, IdentitySource, OrderPoint, OrderRecord,
};
use super::identity::{clean_text, identity_key, normalize_phone};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Groups orders into one profile per identity key, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CustomerAggregator {
    excluded_item_keywords: Vec<String>,
}

/// Profiles plus counts of orders that never reached a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub profiles: Vec<CustomerProfile>,
    pub orders_without_identity: usize,
    pub excluded_item_orders: usize,
}

impl CustomerAggregator {
    pub fn new(excluded_item_keywords: &[String]) -> Self {
        Self {
            excluded_item_keywords: excluded_item_keywords
                .iter()
                .map(|keyword| keyword.trim().to_string())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    pub(crate) fn is_excluded_item(&self, order: &OrderRecord) -> bool {
        match order.item_name.as_deref() {
            Some(item) => self
                .excluded_item_keywords
                .iter()
                .any(|keyword| item.contains(keyword.as_str())),
            None => false,
        }
    }

    pub fn aggregate(&self, orders: &[OrderRecord]) -> Aggregation {
        let mut groups: Vec<GroupBuilder> = Vec::new();
        let mut index: HashMap<CustomerKey, usize> = HashMap::new();
        let mut orders_without_identity = 0;
        let mut excluded_item_orders = 0;

        for order in orders {
            if self.is_excluded_item(order) {
                excluded_item_orders += 1;
                continue;
            }

            let Some((key, identity)) = identity_key(order) else {
                orders_without_identity += 1;
                continue;
            };

            let slot = match index.get(&key) {
                Some(slot) => *slot,
                None => {
                    let slot = groups.len();
                    index.insert(key.clone(), slot);
                    groups.push(GroupBuilder::new(key, identity, slot));
                    slot
                }
            };
            groups[slot].push(order);
        }

        if orders_without_identity > 0 {
            warn!(
                orders = orders_without_identity,
                "orders without phone, name or address were excluded"
            );
        }
        if excluded_item_orders > 0 {
            debug!(
                orders = excluded_item_orders,
                "sample or drop-ship orders skipped"
            );
        }

        Aggregation {
            profiles: groups.into_iter().map(GroupBuilder::finish).collect(),
            orders_without_identity,
            excluded_item_orders,
        }
    }
}

#[derive(Debug)]
struct TallyEntry {
    label: String,
    count: u32,
    latest: NaiveDate,
}

/// Order counts per label. Highest count wins; ties go to the label ordered
/// most recently, then to the label seen first.
#[derive(Debug, Default)]
struct Tally {
    entries: Vec<TallyEntry>,
    positions: HashMap<String, usize>,
}

impl Tally {
    fn add(&mut self, label: &str, date: NaiveDate) {
        match self.positions.get(label) {
            Some(position) => {
                let entry = &mut self.entries[*position];
                entry.count += 1;
                if date > entry.latest {
                    entry.latest = date;
                }
            }
            None => {
                self.positions.insert(label.to_string(), self.entries.len());
                self.entries.push(TallyEntry {
                    label: label.to_string(),
                    count: 1,
                    latest: date,
                });
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ranked(&self) -> Vec<&TallyEntry> {
        let mut ranked: Vec<&TallyEntry> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then(b.latest.cmp(&a.latest)));
        ranked
    }

    fn winner(&self) -> Option<String> {
        self.ranked().first().map(|entry| entry.label.clone())
    }

    fn shares(&self) -> Vec<CategoryShare> {
        self.ranked()
            .into_iter()
            .map(|entry| CategoryShare {
                label: entry.label.clone(),
                orders: entry.count,
            })
            .collect()
    }
}

#[derive(Debug)]
struct GroupBuilder {
    key: CustomerKey,
    identity: IdentitySource,
    sequence: usize,
    phone: Option<String>,
    name: Option<String>,
    address: Option<String>,
    valid_orders: u32,
    cancelled_orders: u32,
    returned_orders: u32,
    total_payment: f64,
    profit_sum: f64,
    every_order_costed: bool,
    platforms: Tally,
    categories: Tally,
    cancelled_categories: Tally,
    history: Vec<OrderPoint>,
}

impl GroupBuilder {
    fn new(key: CustomerKey, identity: IdentitySource, sequence: usize) -> Self {
        Self {
            key,
            identity,
            sequence,
            phone: None,
            name: None,
            address: None,
            valid_orders: 0,
            cancelled_orders: 0,
            returned_orders: 0,
            total_payment: 0.0,
            profit_sum: 0.0,
            every_order_costed: true,
            platforms: Tally::default(),
            categories: Tally::default(),
            cancelled_categories: Tally::default(),
            history: Vec::new(),
        }
    }

    fn push(&mut self, order: &OrderRecord) {
        if self.phone.is_none() {
            self.phone = order.phone.as_deref().and_then(normalize_phone);
        }
        if self.name.is_none() {
            self.name = clean_text(order.name.as_deref());
        }
        if self.address.is_none() {
            self.address = clean_text(order.address.as_deref());
        }

        if order.is_cancelled() {
            self.cancelled_orders += 1;
            if let Some(label) = order.category_label() {
                self.cancelled_categories.add(label, order.order_date);
            }
            return;
        }

        let returned = order.is_return();
        self.valid_orders += 1;
        if returned {
            self.returned_orders += 1;
        }
        self.total_payment += order.gross_revenue;
        match order.gross_profit() {
            Some(profit) => self.profit_sum += profit,
            None => self.every_order_costed = false,
        }
        if let Some(platform) = clean_text(order.platform.as_deref()) {
            self.platforms.add(&platform, order.order_date);
        }
        if let Some(label) = order.category_label() {
            self.categories.add(label, order.order_date);
        }
        self.history.push(OrderPoint {
            date: order.order_date,
            amount: order.gross_revenue,
            returned,
        });
    }

    fn finish(mut self) -> CustomerProfile {
        self.history.sort_by_key(|point| point.date);

        let gross_profit = (self.valid_orders > 0 && self.every_order_costed)
            .then_some(self.profit_sum);

        let preferred_item = if self.categories.is_empty() {
            self.cancelled_categories.winner()
        } else {
            self.categories.winner()
        };

        CustomerProfile {
            key: self.key,
            identity: self.identity,
            sequence: self.sequence,
            phone: self.phone,
            name: self.name,
            address: self.address,
            valid_orders: self.valid_orders,
            cancelled_orders: self.cancelled_orders,
            returned_orders: self.returned_orders,
            total_payment: self.total_payment,
            gross_profit,
            first_order: self.history.first().map(|point| point.date),
            last_order: self.history.last().map(|point| point.date),
            dominant_platform: self.platforms.winner(),
            preferred_item,
            category_distribution: self.categories.shares(),
            history: self.history,
        }
    }
}
