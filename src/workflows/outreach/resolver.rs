use super::config::{BusinessConfig, CategoryRule};
use super::domain::ResolvedParams;

/// Resolves category and platform parameters for a customer.
///
/// Categories are scanned in declaration order and the first alias contained
/// in the preferred item text wins; no match falls back to `defaults`.
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    config: &'a BusinessConfig,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(config: &'a BusinessConfig) -> Self {
        Self { config }
    }

    pub fn match_category(&self, preferred_item: Option<&str>) -> Option<&'a CategoryRule> {
        let item = preferred_item?.trim().to_lowercase();
        if item.is_empty() {
            return None;
        }

        self.config.categories.iter().find(|rule| {
            rule.aliases.iter().any(|alias| {
                let alias = alias.trim().to_lowercase();
                !alias.is_empty() && item.contains(&alias)
            })
        })
    }

    pub fn resolve(&self, preferred_item: Option<&str>, platform: Option<&str>) -> ResolvedParams {
        let defaults = &self.config.defaults;
        let rule = self.match_category(preferred_item);
        let overrides = rule.map(|rule| &rule.overrides);

        let pick = |value: Option<f64>, fallback: f64| value.unwrap_or(fallback);

        let touch_cost = platform
            .map(str::trim)
            .and_then(|name| self.config.platform_touch_cost.get(name))
            .copied()
            .unwrap_or(defaults.touch_cost);

        ResolvedParams {
            category: rule.map(|rule| rule.name.clone()),
            gross_margin: pick(overrides.and_then(|o| o.gross_margin), defaults.gross_margin),
            category_cycle_days: pick(
                overrides.and_then(|o| o.category_cycle_days),
                defaults.category_cycle_days,
            ),
            expected_return_rate: pick(
                overrides.and_then(|o| o.expected_return_rate),
                defaults.expected_return_rate,
            ),
            touch_cost,
            max_estimated_margin: pick(
                overrides.and_then(|o| o.max_estimated_margin),
                defaults.max_estimated_margin,
            ),
            max_estimated_uplift: pick(
                overrides.and_then(|o| o.max_estimated_uplift),
                defaults.max_estimated_uplift,
            ),
        }
    }
}
