//! Menu Allergen Common Library
//!
//! 週間献立表のアレルゲン変換コア。CLIと他の呼び出し側で共有される。
//!
//! - locator: 週列・曜日行の検出
//! - tokenizer: 献立セルの B/L/S 分割と食材トークン化
//! - engine: 置換ルールの適用
//! - normalizer: 提案サービス応答の正規化
//! - summary: 置換/未置換サマリ
//! - processor: 上記をまとめた変換パイプライン

pub mod types;
pub mod error;
pub mod tokenizer;
pub mod locator;
pub mod rules;
pub mod engine;
pub mod normalizer;
pub mod prompts;
pub mod summary;
pub mod fingerprint;
pub mod processor;
pub mod export;

pub use types::{CellCoord, MealCell, MealSlot, ProvenanceEntry, SlotLabel, Weekday};
pub use error::{Error, Result};
pub use tokenizer::{parse_cell, tokenize_ingredients, CellParseError, ParsedCell};
pub use locator::{locate, TableLayout};
pub use rules::{preset_rules, presets_for, RuleSet, RuleSource, SubstitutionRule, KNOWN_ALLERGENS};
pub use engine::{apply, Applied, Substitution};
pub use normalizer::{normalize, IngredientTable, SuggestionMap, STREAM_MARKER};
pub use summary::{build_summary, Summary};
pub use fingerprint::fingerprint;
pub use processor::{Conversion, MenuProcessor, SuggestionRequest, SuggestionService};
