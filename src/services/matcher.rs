use std::sync::Arc;

use crate::models::KeywordRule;
use crate::services::fuzzy;
use crate::store::RuleStore;

/// Evaluates incoming content against the active rule set.
pub struct RuleMatcher {
    rules: Arc<dyn RuleStore>,
}

impl RuleMatcher {
    pub fn new(rules: Arc<dyn RuleStore>) -> Self {
        Self { rules }
    }

    /// All active rules the content matches, in no particular order.
    /// Deterministic for a fixed rule set.
    pub fn find_matches(&self, content: &str) -> anyhow::Result<Vec<KeywordRule>> {
        let active = self.rules.find_active()?;
        Ok(active
            .into_iter()
            .filter(|rule| rule_matches(rule, content))
            .collect())
    }
}

/// Trigger comparison first; if that fails and the rule opts in, fall back
/// to fuzzy matching over the rule's keyword set.
pub fn rule_matches(rule: &KeywordRule, content: &str) -> bool {
    if !rule.is_active {
        return false;
    }

    if rule.matches_trigger(content) {
        return true;
    }

    rule.fuzzy_match
        && !fuzzy::find_fuzzy_matches(content, &rule.keywords, fuzzy::DEFAULT_MAX_DISTANCE)
            .is_empty()
}

/// Highest priority wins. Equal priorities fall back to the lowest rule id
/// so the pick is deterministic. None for an empty input.
pub fn select_best_rule(mut rules: Vec<KeywordRule>) -> Option<KeywordRule> {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
    rules.into_iter().next()
}
