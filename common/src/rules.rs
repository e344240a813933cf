//! 置換ルール
//!
//! カスタムルール（永続化されたユーザー定義）と提案ルール（提案サービスの出力）を
//! 1つのルールセットにまとめる。同じ原文を指すルールはカスタムが優先。

use crate::normalizer::SuggestionMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// ルールの出どころ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    Custom,
    Suggested,
}

/// 置換ルール（原文 → 置換後）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    pub original: String,
    pub replacement: String,
    /// アレルゲン区分（"Dairy" など）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergen: Option<String>,
    pub source: RuleSource,
}

impl SubstitutionRule {
    pub fn custom(original: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            replacement: replacement.into(),
            allergen: None,
            source: RuleSource::Custom,
        }
    }

    pub fn suggested(original: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            replacement: replacement.into(),
            allergen: None,
            source: RuleSource::Suggested,
        }
    }

    pub fn with_allergen(mut self, allergen: impl Into<String>) -> Self {
        self.allergen = Some(allergen.into());
        self
    }
}

/// 照合用にコンパイル済みのルール
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: SubstitutionRule,
    pub(crate) pattern: Regex,
}

/// 1回の変換で使うルールセット
///
/// 原文の長い順（同じ長さならカスタム→提案の順）に並べる。
/// "sour cream" が "cream" より先に区間を確保するため。
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// カスタムルールと提案をマージ（原文の大文字小文字を無視して重複排除、カスタム優先）
    pub fn merge(custom: &[SubstitutionRule], suggestions: &SuggestionMap) -> Self {
        let suggested: Vec<SubstitutionRule> = suggestions
            .iter()
            .map(|(original, replacement)| SubstitutionRule::suggested(original, replacement))
            .collect();

        Self::from_rules(custom.iter().chain(suggested.iter()).cloned())
    }

    /// ルール列から構築（先に現れた原文が優先）
    pub fn from_rules(rules: impl IntoIterator<Item = SubstitutionRule>) -> Self {
        let mut seen = HashSet::new();
        let mut compiled: Vec<CompiledRule> = Vec::new();

        for rule in rules {
            let key = rule.original.trim().to_lowercase();
            if key.is_empty() || !seen.insert(key) {
                continue;
            }

            match RegexBuilder::new(&regex::escape(rule.original.trim()))
                .case_insensitive(true)
                .build()
            {
                Ok(pattern) => compiled.push(CompiledRule { rule, pattern }),
                Err(e) => warn!("ルールをスキップ '{}': {}", rule.original, e),
            }
        }

        // 安定ソートなので同じ長さの中ではカスタム→提案の順が保たれる
        compiled.sort_by_key(|c| std::cmp::Reverse(c.rule.original.trim().chars().count()));

        Self { rules: compiled }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 出どころ別の件数
    pub fn count_by_source(&self, source: RuleSource) -> usize {
        self.rules.iter().filter(|c| c.rule.source == source).count()
    }
}

/// 組み込みプリセットがあるアレルゲン
pub const KNOWN_ALLERGENS: &[&str] = &["Gluten", "Dairy", "Nuts", "Eggs", "Soy"];

/// アレルゲン別の組み込みルール
pub fn preset_rules(allergen: &str) -> Option<Vec<SubstitutionRule>> {
    let pairs: &[(&str, &str)] = match allergen.trim().to_lowercase().as_str() {
        "gluten" | "wheat" => &[
            ("bread", "gluten-free bread"),
            ("pasta", "gluten-free pasta"),
            ("flour tortilla", "corn tortilla"),
            ("breadcrumbs", "gluten-free breadcrumbs"),
            ("wheat flour", "almond flour"),
            ("pizza crust", "gluten-free pizza crust"),
            ("rolls", "gluten-free rolls"),
            ("crackers", "gluten-free crackers"),
        ],
        "dairy" | "milk" => &[
            ("milk", "almond milk"),
            ("cheese", "dairy-free cheese"),
            ("yogurt", "coconut yogurt"),
            ("butter", "plant-based butter"),
            ("cream", "coconut cream"),
            ("sour cream", "dairy-free sour cream"),
        ],
        "nuts" | "tree nuts" | "peanuts" => &[
            ("peanut butter", "sunflower seed butter"),
            ("almond", "seeds"),
            ("cashew", "seeds"),
            ("walnut", "seeds"),
            ("pecan", "seeds"),
        ],
        "eggs" | "egg" | "egg products" => &[
            ("egg", "egg substitute"),
            ("mayonnaise", "vegan mayonnaise"),
            ("egg noodles", "rice noodles"),
        ],
        "soy" => &[
            ("soy sauce", "coconut aminos"),
            ("tofu", "chickpeas"),
            ("edamame", "green peas"),
            ("soy milk", "oat milk"),
        ],
        _ => return None,
    };

    let canonical = KNOWN_ALLERGENS
        .iter()
        .find(|name| name.eq_ignore_ascii_case(allergen.trim()))
        .copied()
        .unwrap_or(allergen.trim());

    Some(
        pairs
            .iter()
            .map(|(original, replacement)| {
                SubstitutionRule::custom(*original, *replacement).with_allergen(canonical)
            })
            .collect(),
    )
}

/// 選択されたアレルゲンのプリセットをまとめて取得（不明なものは警告して無視）
pub fn presets_for(allergens: &[String]) -> Vec<SubstitutionRule> {
    let mut rules = Vec::new();
    for allergen in allergens {
        match preset_rules(allergen) {
            Some(preset) => rules.extend(preset),
            None => warn!("不明なアレルゲン '{}' のプリセットはありません", allergen),
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_custom_wins_same_original() {
        let custom = vec![SubstitutionRule::custom("Milk", "Soy milk")];
        let mut suggestions = SuggestionMap::new();
        suggestions.insert("milk".to_string(), "Oat milk".to_string());
        suggestions.insert("Cheese".to_string(), "Vegan cheese".to_string());

        let set = RuleSet::merge(&custom, &suggestions);
        assert_eq!(set.len(), 2);
        let milk = set.iter().find(|c| c.rule.original.eq_ignore_ascii_case("milk")).unwrap();
        assert_eq!(milk.rule.replacement, "Soy milk");
        assert_eq!(milk.rule.source, RuleSource::Custom);
        assert_eq!(set.count_by_source(RuleSource::Suggested), 1);
    }

    #[test]
    fn test_rules_sorted_longest_first() {
        let set = RuleSet::from_rules(vec![
            SubstitutionRule::custom("cream", "coconut cream"),
            SubstitutionRule::custom("sour cream", "dairy-free sour cream"),
        ]);
        let originals: Vec<&str> = set.iter().map(|c| c.rule.original.as_str()).collect();
        assert_eq!(originals, vec!["sour cream", "cream"]);
    }

    #[test]
    fn test_empty_original_is_dropped() {
        let set = RuleSet::from_rules(vec![SubstitutionRule::custom("  ", "x")]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_preset_rules() {
        let dairy = preset_rules("dairy").unwrap();
        assert!(dairy.iter().any(|r| r.original == "milk" && r.replacement == "almond milk"));
        assert!(dairy.iter().all(|r| r.allergen.as_deref() == Some("Dairy")));
        assert!(preset_rules("Fish").is_none());
    }

    #[test]
    fn test_presets_for_skips_unknown() {
        let rules = presets_for(&["Soy".to_string(), "Sesame".to_string()]);
        assert_eq!(rules.len(), 4);
    }
}
