//! プロンプト生成モジュール
//!
//! 提案サービスに渡すプロンプトを組み立てる:
//! - SYSTEM_INSTRUCTIONS: 役割の指示
//! - build_suggestion_prompt: 献立全体を1回で問い合わせるプロンプト

use crate::normalizer::{IngredientTable, STREAM_MARKER};
use crate::rules::SubstitutionRule;

/// 役割の指示
pub const SYSTEM_INSTRUCTIONS: &str = "You are a dietary safety expert preventing severe allergic \
reactions in children. Only suggest substitutions for the allergens that are explicitly listed. \
Know the hidden allergens: eggs are in pancakes, waffles, muffins and most baked goods; dairy is in \
all cheese, milk, yogurt and butter; fish includes tuna and all seafood; gluten is in wheat, bread, \
pasta and cereals.";

/// アレルゲンごとの見落としやすい食品
const HIDDEN_ALLERGEN_HINTS: &[(&str, &str)] = &[
    ("egg", "pancakes, waffles, muffins, enriched breads and baked goods usually contain eggs"),
    ("dairy", "cheese, milk, yogurt, butter, cream cheese and ice cream all contain dairy"),
    ("fish", "fish sticks, tuna, salmon and other seafood"),
    ("gluten", "wheat, bread, pasta, crackers and most cereal products"),
];

/// 置換先として望ましい例
const PREFERRED_STAPLES: &[&str] = &[
    "Noodles -> rice (Gluten)",
    "Crackers -> fruit (Gluten)",
    "Most cereals -> Cheerios (Gluten)",
    "Turkey & Cheese sandwich -> Turkey sandwich (Dairy)",
];

/// 提案リクエスト用プロンプト生成
///
/// # Arguments
/// * `ingredients` - 食材IDテーブル（全セル分）
/// * `allergens` - 除去するアレルゲン
/// * `custom_rules` - 優先して従うカスタムルール
///
/// # Returns
/// `===JSON===` 行の後に `[{"id", "substitution"}]` を出力させるプロンプト
pub fn build_suggestion_prompt(
    ingredients: &IngredientTable,
    allergens: &[String],
    custom_rules: &[SubstitutionRule],
) -> String {
    let rules_section = if custom_rules.is_empty() {
        String::new()
    } else {
        let lines = custom_rules
            .iter()
            .map(|r| format!("- Replace '{}' with '{}'", r.original, r.replacement))
            .collect::<Vec<_>>()
            .join("\n");
        format!("## Custom rules (already applied, do not repeat them)\n{}\n\n", lines)
    };

    let ingredient_list = ingredients
        .entries()
        .iter()
        .map(|(id, text)| format!("- {}: {}", id, text))
        .collect::<Vec<_>>()
        .join("\n");

    let hints = HIDDEN_ALLERGEN_HINTS
        .iter()
        .filter(|(key, _)| allergens.iter().any(|a| a.to_lowercase().contains(key)))
        .map(|(_, hint)| format!("- {}", hint))
        .collect::<Vec<_>>()
        .join("\n");
    let hints_section = if hints.is_empty() {
        String::new()
    } else {
        format!("## Hidden allergens\n{}\n\n", hints)
    };

    let staples = PREFERRED_STAPLES
        .iter()
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze these school menu items and suggest safe substitutions for children with severe allergies.

ONLY substitute items that contain the allergens listed below. Leave every other item alone.

## Allergens to avoid
{allergens}

{rules_section}{hints_section}## Preferred substitutions (common staples over specialty products)
{staples}

## Menu items (id: text)
{ingredient_list}

## Output
You may think out loud first. Then print a line containing only {marker}
followed by a single JSON array and nothing else:
[
  {{"id": "ing_1", "substitution": "replacement text"}}
]

- Use the ids exactly as listed
- Include only items that need a substitution
- One flat replacement string per item, no nested objects
"#,
        allergens = allergens.join(", "),
        marker = STREAM_MARKER,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_suggestion_prompt() {
        let ids = IngredientTable::from_texts(["Milk toast", "Cheese sandwich"]);
        let prompt = build_suggestion_prompt(
            &ids,
            &["Dairy".to_string()],
            &[SubstitutionRule::custom("Milk", "Soy milk")],
        );
        assert!(prompt.contains("- ing_1: Milk toast"));
        assert!(prompt.contains("- ing_2: Cheese sandwich"));
        assert!(prompt.contains("Replace 'Milk' with 'Soy milk'"));
        assert!(prompt.contains("cream cheese"));
        assert!(prompt.contains(STREAM_MARKER));
        assert!(!prompt.contains("fish sticks"));
    }

    #[test]
    fn test_build_suggestion_prompt_without_rules() {
        let ids = IngredientTable::from_texts(["Fish sticks"]);
        let prompt = build_suggestion_prompt(&ids, &["Fish".to_string()], &[]);
        assert!(!prompt.contains("Custom rules"));
        assert!(prompt.contains("fish sticks, tuna"));
    }
}
