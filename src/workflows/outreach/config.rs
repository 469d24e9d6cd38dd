use super::domain::{CustomerTag, GrowthType, ValueTier};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Failure to load or validate the business configuration document.
#[derive(Debug, thiserror::Error)]
pub enum BusinessConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{origin} is not a valid configuration document: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{origin} is missing the required `defaults` section")]
    MissingDefaults { origin: String },
    #[error("{origin}: `{field}` {detail}")]
    Invalid {
        origin: String,
        field: String,
        detail: String,
    },
}

/// Business parameters for a run, loaded once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessConfig {
    pub defaults: CategoryDefaults,
    /// Category rules in declaration order; the first alias hit wins.
    pub categories: Vec<CategoryRule>,
    pub platform_touch_cost: BTreeMap<String, f64>,
    pub filters: FilterSettings,
    pub uplift: UpliftSettings,
    pub clv_weights: ClvWeights,
    pub customer_tiers: TierThresholds,
    pub tags: TagThresholds,
    pub growth: GrowthSettings,
    pub orders_dampening: OrdersDampening,
    pub priority_boosts: Vec<BoostRule>,
    pub single_order: SingleOrderPolicy,
    pub integrity: IntegritySettings,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    defaults: Option<CategoryDefaults>,
    #[serde(default, deserialize_with = "ordered_categories")]
    categories: Vec<CategoryRule>,
    #[serde(default)]
    platform_touch_cost: BTreeMap<String, f64>,
    #[serde(default)]
    filters: FilterSettings,
    #[serde(default)]
    uplift: UpliftSettings,
    #[serde(default)]
    clv_weights: ClvWeights,
    #[serde(default)]
    customer_tiers: TierThresholds,
    #[serde(default)]
    tags: TagThresholds,
    #[serde(default)]
    growth: GrowthSettings,
    #[serde(default)]
    orders_dampening: OrdersDampening,
    #[serde(default = "default_boosts")]
    priority_boosts: Vec<BoostRule>,
    #[serde(default)]
    single_order: SingleOrderPolicy,
    #[serde(default)]
    integrity: IntegritySettings,
}

impl BusinessConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BusinessConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BusinessConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Parses and validates a document; `origin` names it in diagnostics.
    pub fn from_reader<R: Read>(reader: R, origin: &str) -> Result<Self, BusinessConfigError> {
        let document: ConfigDocument =
            serde_json::from_reader(reader).map_err(|source| BusinessConfigError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        let defaults = document
            .defaults
            .ok_or_else(|| BusinessConfigError::MissingDefaults {
                origin: origin.to_string(),
            })?;

        let config = Self {
            defaults,
            categories: document.categories,
            platform_touch_cost: document.platform_touch_cost,
            filters: document.filters,
            uplift: document.uplift,
            clv_weights: document.clv_weights,
            customer_tiers: document.customer_tiers,
            tags: document.tags,
            growth: document.growth,
            orders_dampening: document.orders_dampening,
            priority_boosts: document.priority_boosts,
            single_order: document.single_order,
            integrity: document.integrity,
        };
        config.validate(origin)?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, BusinessConfigError> {
        Self::from_reader(json.as_bytes(), "inline configuration")
    }

    fn validate(&self, origin: &str) -> Result<(), BusinessConfigError> {
        let invalid = |field: &str, detail: &str| BusinessConfigError::Invalid {
            origin: origin.to_string(),
            field: field.to_string(),
            detail: detail.to_string(),
        };

        check_params(
            "defaults",
            Some(self.defaults.gross_margin),
            Some(self.defaults.category_cycle_days),
            Some(self.defaults.expected_return_rate),
            Some(self.defaults.touch_cost),
            Some(self.defaults.max_estimated_margin),
            Some(self.defaults.max_estimated_uplift),
        )
        .map_err(|(field, detail)| invalid(&field, detail))?;

        for rule in &self.categories {
            if rule.aliases.iter().all(|alias| alias.trim().is_empty()) {
                return Err(invalid(
                    &format!("categories.{}.aliases", rule.name),
                    "must list at least one non-empty alias",
                ));
            }
            let overrides = &rule.overrides;
            check_params(
                &format!("categories.{}", rule.name),
                overrides.gross_margin,
                overrides.category_cycle_days,
                overrides.expected_return_rate,
                None,
                overrides.max_estimated_margin,
                overrides.max_estimated_uplift,
            )
            .map_err(|(field, detail)| invalid(&field, detail))?;
        }

        for (platform, cost) in &self.platform_touch_cost {
            if !cost.is_finite() || *cost < 0.0 {
                return Err(invalid(
                    &format!("platform_touch_cost.{platform}"),
                    "must be a non-negative number",
                ));
            }
        }

        if !(self.filters.churn_multiplier > 0.0) {
            return Err(invalid("filters.churn_multiplier", "must be positive"));
        }
        if !(self.filters.default_churn_days >= 0.0) {
            return Err(invalid("filters.default_churn_days", "must not be negative"));
        }

        let uplift = &self.uplift;
        if !(uplift.floor >= 0.0) || !(uplift.premium_ceiling >= uplift.floor) {
            return Err(invalid(
                "uplift",
                "requires 0 <= floor <= premium_ceiling",
            ));
        }
        if uplift.floor > self.defaults.max_estimated_uplift {
            return Err(invalid(
                "uplift.floor",
                "must not exceed defaults.max_estimated_uplift",
            ));
        }

        let weights = &self.clv_weights;
        let parts = [weights.historical, weights.activity, weights.growth];
        if parts.iter().any(|weight| !(*weight >= 0.0)) || parts.iter().sum::<f64>() <= 0.0 {
            return Err(invalid(
                "clv_weights",
                "must be non-negative with a positive sum",
            ));
        }
        if weights.activity_window_days == 0 {
            return Err(invalid("clv_weights.activity_window_days", "must be positive"));
        }

        if self.customer_tiers.medium_value_threshold > self.customer_tiers.high_value_threshold {
            return Err(invalid(
                "customer_tiers",
                "medium_value_threshold must not exceed high_value_threshold",
            ));
        }

        for (field, weight) in self.orders_dampening.entries() {
            if !(0.0..=1.0).contains(&weight) {
                return Err(invalid(&field, "must be within 0..=1"));
            }
        }

        if self.tags.return_spike_window == 0 {
            return Err(invalid("tags.return_spike_window", "must be positive"));
        }

        if !(0.0..=1.0).contains(&self.integrity.max_rejected_fraction) {
            return Err(invalid(
                "integrity.max_rejected_fraction",
                "must be within 0..=1",
            ));
        }

        Ok(())
    }
}

fn check_params(
    prefix: &str,
    gross_margin: Option<f64>,
    cycle_days: Option<f64>,
    expected_return_rate: Option<f64>,
    touch_cost: Option<f64>,
    max_margin: Option<f64>,
    max_uplift: Option<f64>,
) -> Result<(), (String, &'static str)> {
    let field = |name: &str| format!("{prefix}.{name}");

    if let Some(value) = gross_margin {
        if !(0.0..=1.0).contains(&value) {
            return Err((field("gross_margin"), "must be within 0..=1"));
        }
    }
    if let Some(value) = cycle_days {
        if !(value > 0.0) {
            return Err((field("category_cycle_days"), "must be positive"));
        }
    }
    if let Some(value) = expected_return_rate {
        if !(0.0..=1.0).contains(&value) {
            return Err((field("expected_return_rate"), "must be within 0..=1"));
        }
    }
    if let Some(value) = touch_cost {
        if !(value >= 0.0) {
            return Err((field("touch_cost"), "must not be negative"));
        }
    }
    if let Some(value) = max_margin {
        if !(value >= 0.0) {
            return Err((field("max_estimated_margin"), "must not be negative"));
        }
    }
    if let Some(value) = max_uplift {
        if !(value > 0.0) {
            return Err((field("max_estimated_uplift"), "must be positive"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDefaults {
    pub gross_margin: f64,
    pub category_cycle_days: f64,
    pub expected_return_rate: f64,
    pub touch_cost: f64,
    #[serde(default = "default_max_estimated_margin")]
    pub max_estimated_margin: f64,
    #[serde(default = "default_max_estimated_uplift")]
    pub max_estimated_uplift: f64,
    /// Item-name keywords (samples, drop-shipping) that never count as customer orders.
    #[serde(default = "default_excluded_item_keywords")]
    pub excluded_item_keywords: Vec<String>,
}

fn default_max_estimated_margin() -> f64 {
    8000.0
}

fn default_max_estimated_uplift() -> f64 {
    0.3
}

fn default_excluded_item_keywords() -> Vec<String> {
    vec!["样品".to_string(), "代发".to_string()]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryOverrides {
    pub gross_margin: Option<f64>,
    pub category_cycle_days: Option<f64>,
    pub expected_return_rate: Option<f64>,
    pub max_estimated_margin: Option<f64>,
    pub max_estimated_uplift: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRule {
    pub name: String,
    pub aliases: Vec<String>,
    pub overrides: CategoryOverrides,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(flatten)]
    overrides: CategoryOverrides,
}

// Streams the `categories` object so declaration order survives parsing.
fn ordered_categories<'de, D>(deserializer: D) -> Result<Vec<CategoryRule>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CategoriesVisitor;

    impl<'de> Visitor<'de> for CategoriesVisitor {
        type Value = Vec<CategoryRule>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object mapping category names to aliases and overrides")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut rules = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, entry)) = map.next_entry::<String, CategoryEntry>()? {
                let aliases = if entry.aliases.is_empty() {
                    vec![name.clone()]
                } else {
                    entry.aliases
                };
                rules.push(CategoryRule {
                    name,
                    aliases,
                    overrides: entry.overrides,
                });
            }
            Ok(rules)
        }
    }

    deserializer.deserialize_map(CategoriesVisitor)
}

/// Defaults for run parameters; CLI flags override them per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub cooldown_days: u32,
    pub churn_multiplier: f64,
    pub default_churn_days: f64,
    pub exclude_recent_days: u32,
    pub allow_high_return: bool,
    pub max_action_count: Option<usize>,
    pub min_priority_score: f64,
    pub min_orders: u32,
    pub qualifying_tags: Vec<CustomerTag>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            cooldown_days: 7,
            churn_multiplier: 1.5,
            default_churn_days: 90.0,
            exclude_recent_days: 30,
            allow_high_return: false,
            max_action_count: None,
            min_priority_score: 50.0,
            min_orders: 5,
            qualifying_tags: CustomerTag::ordered().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpliftSettings {
    pub base: f64,
    pub floor: f64,
    /// Ceiling for repeat customers with a clean return history.
    pub premium_ceiling: f64,
    pub premium_min_orders: u32,
    pub premium_max_return_rate: f64,
}

impl Default for UpliftSettings {
    fn default() -> Self {
        Self {
            base: 0.1,
            floor: 0.05,
            premium_ceiling: 0.45,
            premium_min_orders: 3,
            premium_max_return_rate: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClvWeights {
    pub historical: f64,
    pub activity: f64,
    pub growth: f64,
    /// Look-back used for the recent-spend share in the activity sub-score.
    pub activity_window_days: u32,
}

impl Default for ClvWeights {
    fn default() -> Self {
        Self {
            historical: 0.4,
            activity: 0.3,
            growth: 0.3,
            activity_window_days: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub high_value_threshold: f64,
    pub medium_value_threshold: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            high_value_threshold: 3000.0,
            medium_value_threshold: 1000.0,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, cumulative_spend: f64) -> ValueTier {
        if cumulative_spend >= self.high_value_threshold {
            ValueTier::High
        } else if cumulative_spend >= self.medium_value_threshold {
            ValueTier::Medium
        } else {
            ValueTier::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagThresholds {
    /// Last order below this share of the earlier average counts as a spend drop.
    pub spend_drop_ratio: f64,
    pub return_spike_window: usize,
    pub return_spike_min_returns: usize,
    pub anniversary_lead_days: u32,
    pub star_min_clv: f64,
    pub potential_min_clv: f64,
}

impl Default for TagThresholds {
    fn default() -> Self {
        Self {
            spend_drop_ratio: 0.5,
            return_spike_window: 3,
            return_spike_min_returns: 2,
            anniversary_lead_days: 7,
            star_min_clv: 80.0,
            potential_min_clv: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthSettings {
    /// Relative spend slope (per order, as a share of the mean) marking growth or decline.
    pub trend_threshold: f64,
    pub new_customer_days: u32,
    pub high_potential_aov: f64,
}

impl Default for GrowthSettings {
    fn default() -> Self {
        Self {
            trend_threshold: 0.1,
            new_customer_days: 90,
            high_potential_aov: 300.0,
        }
    }
}

/// Confidence weights keyed by valid order count.
///
/// Written as `{"1": 0.3, "2": 0.7, "default": 1.0}`; any count may carry its
/// own weight and counts without one use `default` (1.0 when omitted). A
/// document that declares the table replaces the built-in one wholesale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>")]
pub struct OrdersDampening {
    pub by_count: BTreeMap<u32, f64>,
    pub default: f64,
}

impl Default for OrdersDampening {
    fn default() -> Self {
        Self {
            by_count: BTreeMap::from([(1, 0.3), (2, 0.7)]),
            default: 1.0,
        }
    }
}

impl TryFrom<BTreeMap<String, f64>> for OrdersDampening {
    type Error = String;

    fn try_from(table: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let mut dampening = Self {
            by_count: BTreeMap::new(),
            default: 1.0,
        };
        for (key, weight) in table {
            if key.trim() == "default" {
                dampening.default = weight;
                continue;
            }
            let count = key.trim().parse::<u32>().map_err(|_| {
                format!("orders_dampening key `{key}` must be an order count or `default`")
            })?;
            dampening.by_count.insert(count, weight);
        }
        Ok(dampening)
    }
}

impl OrdersDampening {
    pub fn weight_for(&self, valid_orders: u32) -> f64 {
        if valid_orders == 0 {
            return 0.0;
        }
        self.by_count
            .get(&valid_orders)
            .copied()
            .unwrap_or(self.default)
    }

    /// `(config path, weight)` pairs for validation and display.
    pub fn entries(&self) -> Vec<(String, f64)> {
        self.by_count
            .iter()
            .map(|(count, weight)| (format!("orders_dampening.{count}"), *weight))
            .chain(std::iter::once((
                "orders_dampening.default".to_string(),
                self.default,
            )))
            .collect()
    }
}

/// Additive score adjustment applied when its condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostRule {
    pub name: String,
    pub when: BoostCondition,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostCondition {
    Tag(CustomerTag),
    MinOrders(u32),
    MinClv(f64),
    ValueTier(ValueTier),
    GrowthType(GrowthType),
}

fn default_boosts() -> Vec<BoostRule> {
    vec![
        BoostRule {
            name: "star_customer".to_string(),
            when: BoostCondition::Tag(CustomerTag::Star),
            points: 30.0,
        },
        BoostRule {
            name: "loyal_ten_orders".to_string(),
            when: BoostCondition::MinOrders(10),
            points: 20.0,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleOrderScope {
    /// Only customers whose sole order fell in the calendar month before the run date.
    PreviousMonth,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleOrderPolicy {
    pub enabled: bool,
    pub scope: SingleOrderScope,
}

impl Default for SingleOrderPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            scope: SingleOrderScope::PreviousMonth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegritySettings {
    /// Share of unreadable ledger rows tolerated before the import is aborted.
    pub max_rejected_fraction: f64,
}

impl Default for IntegritySettings {
    fn default() -> Self {
        Self {
            max_rejected_fraction: 0.5,
        }
    }
}
