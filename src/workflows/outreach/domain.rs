use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

const CANCEL_MARKERS: [&str; 2] = ["取消", "cancel"];
const RETURN_MARKERS: [&str; 5] = ["退", "换", "return", "refund", "exchange"];

fn contains_marker(text: Option<&str>, markers: &[&str]) -> bool {
    match text {
        Some(value) => {
            let lowered = value.to_lowercase();
            markers.iter().any(|marker| lowered.contains(marker))
        }
        None => false,
    }
}

/// One ledger line as handed over by the ingestion layer.
///
/// Carries no stored profit column; profit is always `gross_revenue - payment_amount`
/// (see [`OrderRecord::gross_profit`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub phone: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub order_date: NaiveDate,
    /// Amount collected from the customer.
    pub gross_revenue: f64,
    /// Amount paid out to the supplier for the goods.
    pub payment_amount: Option<f64>,
    pub refund_amount: f64,
    pub refund_type: Option<String>,
    pub refund_status: Option<String>,
    pub order_status: Option<String>,
    pub platform: Option<String>,
    pub category: Option<String>,
    pub item_name: Option<String>,
    pub tracking_number: Option<String>,
}

impl OrderRecord {
    pub fn is_cancelled(&self) -> bool {
        contains_marker(self.order_status.as_deref(), &CANCEL_MARKERS)
            || contains_marker(self.refund_type.as_deref(), &CANCEL_MARKERS)
            || self.gross_revenue <= 0.0
    }

    pub fn is_return(&self) -> bool {
        self.refund_amount > 0.0
            || contains_marker(self.refund_type.as_deref(), &RETURN_MARKERS)
            || contains_marker(self.refund_status.as_deref(), &RETURN_MARKERS)
    }

    /// Profit for this order, available only when a supplier payment was recorded.
    pub fn gross_profit(&self) -> Option<f64> {
        self.payment_amount
            .filter(|payment| *payment > 0.0)
            .map(|payment| self.gross_revenue - payment)
    }

    /// Text used for category tallies and alias matching.
    pub fn category_label(&self) -> Option<&str> {
        self.category
            .as_deref()
            .or(self.item_name.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerKey(pub String);

impl fmt::Display for CustomerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which identity field produced the customer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    Phone,
    NameAndAddress,
    Name,
    Address,
}

/// A valid order reduced to what the metric engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderPoint {
    pub date: NaiveDate,
    pub amount: f64,
    pub returned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub label: String,
    pub orders: u32,
}

/// Aggregated order history for one identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerProfile {
    pub key: CustomerKey,
    pub identity: IdentitySource,
    /// Position in first-seen order; the final ranking tie-break.
    pub sequence: usize,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub valid_orders: u32,
    pub cancelled_orders: u32,
    pub returned_orders: u32,
    pub total_payment: f64,
    pub gross_profit: Option<f64>,
    pub first_order: Option<NaiveDate>,
    pub last_order: Option<NaiveDate>,
    pub dominant_platform: Option<String>,
    pub preferred_item: Option<String>,
    pub category_distribution: Vec<CategoryShare>,
    /// Valid orders in chronological order.
    pub history: Vec<OrderPoint>,
}

impl CustomerProfile {
    pub fn has_valid_orders(&self) -> bool {
        self.valid_orders > 0
    }
}

/// Category and platform parameters resolved for a single customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedParams {
    pub category: Option<String>,
    pub gross_margin: f64,
    pub category_cycle_days: f64,
    pub expected_return_rate: f64,
    pub touch_cost: f64,
    pub max_estimated_margin: f64,
    pub max_estimated_uplift: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginSource {
    GrossProfit,
    CategoryMargin,
    NoOrders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTier {
    High,
    Medium,
    Low,
}

impl ValueTier {
    pub const fn ordered() -> [Self; 3] {
        [Self::High, Self::Medium, Self::Low]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High Value",
            Self::Medium => "Medium Value",
            Self::Low => "Low Value",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthType {
    Growing,
    HighPotentialNew,
    Stable,
    Declining,
    New,
    Inactive,
}

impl GrowthType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Growing => "Growing",
            Self::HighPotentialNew => "High-Potential New",
            Self::Stable => "Stable",
            Self::Declining => "Declining",
            Self::New => "New",
            Self::Inactive => "Inactive",
        }
    }
}

/// Normalised CLV sub-scores, each on a 0-1 scale, plus the weighted 0-100 total.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ClvScore {
    pub historical: f64,
    pub activity: f64,
    pub growth: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerMetrics {
    pub days_since_last_order: Option<i64>,
    pub days_since_first_order: Option<i64>,
    pub average_order_value: f64,
    pub actual_return_rate: f64,
    pub return_rate: f64,
    pub estimated_margin: f64,
    pub margin_source: MarginSource,
    /// Average gap between orders; `None` below two orders or when all orders share a day.
    pub personal_gap_days: Option<f64>,
    pub repurchase_threshold_days: f64,
    pub uplift_ratio: f64,
    pub uplift: f64,
    pub uplift_ceiling: f64,
    pub spend_trend: f64,
    pub clv: ClvScore,
    pub value_tier: ValueTier,
    pub growth_type: GrowthType,
}

/// Fixed tag vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTag {
    ChurnRiskLongTerm,
    ChurnRiskShortTerm,
    SpendDrop,
    ReturnSpike,
    Anniversary,
    HighValueActive,
    Star,
    Potential,
    Growing,
}

impl CustomerTag {
    pub const fn ordered() -> [Self; 9] {
        [
            Self::ChurnRiskLongTerm,
            Self::ChurnRiskShortTerm,
            Self::SpendDrop,
            Self::ReturnSpike,
            Self::Anniversary,
            Self::HighValueActive,
            Self::Star,
            Self::Potential,
            Self::Growing,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ChurnRiskLongTerm => "Churn Risk (Long-Term)",
            Self::ChurnRiskShortTerm => "Churn Risk (Short-Term)",
            Self::SpendDrop => "Spend Drop",
            Self::ReturnSpike => "Return Spike",
            Self::Anniversary => "Anniversary",
            Self::HighValueActive => "High-Value Active",
            Self::Star => "Star",
            Self::Potential => "Potential",
            Self::Growing => "Growing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBucket {
    High,
    Medium,
    Low,
    Negative,
}

impl PriorityBucket {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::High
        } else if score >= 50.0 {
            Self::Medium
        } else if score >= 0.0 {
            Self::Low
        } else {
            Self::Negative
        }
    }

    pub const fn ordered() -> [Self; 4] {
        [Self::High, Self::Medium, Self::Low, Self::Negative]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Negative => "Negative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedBoost {
    pub rule: String,
    pub points: f64,
}

/// Audit trail for a priority score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub uplift: f64,
    pub estimated_margin: f64,
    pub return_rate: f64,
    pub confidence_weight: f64,
    pub touch_cost: f64,
    pub base_score: f64,
    pub boosts: Vec<AppliedBoost>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityAssessment {
    pub score: f64,
    pub bucket: PriorityBucket,
    pub churn_threshold_days: f64,
    pub tags: BTreeSet<CustomerTag>,
    pub breakdown: ScoreBreakdown,
}

/// Fully computed customer, shared read-only by the overview and the action list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub profile: CustomerProfile,
    pub params: ResolvedParams,
    pub metrics: CustomerMetrics,
    pub assessment: PriorityAssessment,
}

impl CustomerRecord {
    pub fn key(&self) -> &CustomerKey {
        &self.profile.key
    }

    pub fn score(&self) -> f64 {
        self.assessment.score
    }

    pub fn has_tag(&self, tag: CustomerTag) -> bool {
        self.assessment.tags.contains(&tag)
    }
}

/// Latest outreach date per normalised phone number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactLog {
    last_contact: HashMap<String, NaiveDate>,
}

impl ContactLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a contact, keeping the most recent date per phone.
    pub fn record(&mut self, phone: impl Into<String>, date: NaiveDate) {
        self.last_contact
            .entry(phone.into())
            .and_modify(|existing| {
                if date > *existing {
                    *existing = date;
                }
            })
            .or_insert(date);
    }

    pub fn last_contact(&self, phone: &str) -> Option<NaiveDate> {
        self.last_contact.get(phone).copied()
    }

    pub fn len(&self) -> usize {
        self.last_contact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_contact.is_empty()
    }
}

impl FromIterator<(String, NaiveDate)> for ContactLog {
    fn from_iter<T: IntoIterator<Item = (String, NaiveDate)>>(iter: T) -> Self {
        let mut log = ContactLog::new();
        for (phone, date) in iter {
            log.record(phone, date);
        }
        log
    }
}

/// Cooldown input for a run. When the log could not be read the cooldown rule
/// is skipped wholesale rather than applied to a partial log.
#[derive(Debug, Clone, PartialEq)]
pub enum CooldownSource {
    Available(ContactLog),
    Unavailable { reason: String },
}

impl CooldownSource {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}
