//! 献立変換の本体
//!
//! ## 処理フロー
//! 1. 週・曜日グリッドを検出（locator）
//! 2. 各献立セルを B/L/S に分割（tokenizer）
//! 3. 表全体の食材で提案サービスに1回だけ問い合わせ
//! 4. カスタムルール ∪ 提案ルールをセルごとに適用（engine）
//! 5. 置換履歴からサマリを作成（summary）

use crate::engine;
use crate::error::{Error, Result};
use crate::fingerprint::fingerprint;
use crate::locator::{self, cell_at, TableLayout};
use crate::normalizer::{self, IngredientTable, SuggestionMap};
use crate::prompts::build_suggestion_prompt;
use crate::rules::{RuleSet, RuleSource, SubstitutionRule};
use crate::summary::{build_summary, Summary};
use crate::tokenizer::{parse_cell, CellParseError};
use crate::types::{CellCoord, MealCell, MealSlot, ProvenanceEntry};
use serde::Serialize;
use tracing::{debug, info, warn};

/// 提案サービスへのリクエスト（表全体で1件）
#[derive(Debug, Clone)]
pub struct SuggestionRequest {
    pub ingredients: IngredientTable,
    pub allergens: Vec<String>,
    pub custom_rules: Vec<SubstitutionRule>,
    pub prompt: String,
}

impl SuggestionRequest {
    /// 食材テキスト（ID順）
    pub fn ingredient_texts(&self) -> Vec<&str> {
        self.ingredients.texts()
    }
}

/// 提案サービス
///
/// 応答を待つ間、受け取ったテキストを `progress` に逐次渡してよい。
/// 接続できない場合は `Error::ServiceUnavailable` を返す。
pub trait SuggestionService {
    fn request_suggestions(
        &self,
        request: &SuggestionRequest,
        progress: &mut dyn FnMut(&str),
    ) -> Result<String>;
}

/// 変換結果
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    /// 入力と同じ形の表（献立セルのみ置換済み）
    pub table: Vec<Vec<String>>,
    pub provenance: Vec<ProvenanceEntry>,
    pub summary: Summary,
    /// 正規化済みの提案
    pub suggestions: SuggestionMap,
    pub fingerprint: String,
}

impl Conversion {
    /// 変更ログ
    pub fn changes(&self) -> Vec<String> {
        self.provenance.iter().map(ProvenanceEntry::describe).collect()
    }

    /// セル (row, col) の置換履歴
    pub fn provenance_for(&self, row: usize, col: usize) -> Vec<&ProvenanceEntry> {
        self.provenance
            .iter()
            .filter(|p| p.coord.row == row && p.coord.col == col)
            .collect()
    }
}

/// 献立プロセッサ
///
/// 生成時に表全体の検出とセル分割を済ませる。生成後は変更しない。
#[derive(Debug, Clone)]
pub struct MenuProcessor {
    table: Vec<Vec<String>>,
    layout: TableLayout,
    meal_cells: Vec<MealCell>,
}

impl MenuProcessor {
    /// 表を解析する
    ///
    /// # Errors
    /// * `Error::NoWeekColumns` / `Error::MissingWeekdays` - グリッドが見つからない
    /// * `Error::EmptyCell` / `Error::MissingSlot` - 献立セルが不正（週・曜日付き）
    pub fn new(table: Vec<Vec<String>>) -> Result<Self> {
        let layout = locator::locate(&table)?;

        let mut meal_cells = Vec::new();
        for (week_col, day_row) in layout.coordinates() {
            let coord = CellCoord {
                week: week_col.week,
                day: day_row.day,
                row: day_row.row,
                col: week_col.col,
            };
            let raw = cell_at(&table, coord.row, coord.col);
            let parsed = parse_cell(raw).map_err(|e| match e {
                CellParseError::Empty => Error::EmptyCell {
                    week: coord.week,
                    day: coord.day,
                },
                CellParseError::MissingSlots(missing) => Error::MissingSlot {
                    week: coord.week,
                    day: coord.day,
                    missing,
                },
            })?;
            meal_cells.push(MealCell::new(coord, parsed));
        }

        info!(
            "献立表を解析: {}週 x {}日 = {}セル",
            layout.week_columns.len(),
            layout.day_rows.len(),
            meal_cells.len()
        );

        Ok(Self {
            table,
            layout,
            meal_cells,
        })
    }

    pub fn table(&self) -> &[Vec<String>] {
        &self.table
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    pub fn meal_cells(&self) -> &[MealCell] {
        &self.meal_cells
    }

    /// 全セルの食材IDテーブル（週→曜日→区分の順）
    pub fn ingredient_table(&self) -> IngredientTable {
        let tokens: Vec<String> = self
            .meal_cells
            .iter()
            .flat_map(|cell| {
                MealSlot::ALL
                    .iter()
                    .flat_map(move |&slot| cell.parsed().ingredients(slot))
            })
            .collect();
        IngredientTable::from_texts(tokens)
    }

    /// 提案リクエストを作る。アレルゲン未選択なら None（問い合わせ不要）
    pub fn suggestion_request(
        &self,
        allergens: &[String],
        custom_rules: &[SubstitutionRule],
    ) -> Option<SuggestionRequest> {
        if allergens.is_empty() {
            return None;
        }
        let ingredients = self.ingredient_table();
        if ingredients.is_empty() {
            return None;
        }

        let prompt = build_suggestion_prompt(&ingredients, allergens, custom_rules);
        Some(SuggestionRequest {
            ingredients,
            allergens: allergens.to_vec(),
            custom_rules: custom_rules.to_vec(),
            prompt,
        })
    }

    /// 実行のフィンガープリント
    pub fn fingerprint(&self, allergens: &[String], custom_rules: &[SubstitutionRule]) -> String {
        fingerprint(&self.table, allergens, custom_rules)
    }

    /// 提案サービスに1回問い合わせてから変換する
    ///
    /// サービスの失敗・不正なレスポンスは「提案なし」として扱い、
    /// カスタムルールだけで変換を完了する。
    pub fn convert_menu(
        &self,
        custom_rules: &[SubstitutionRule],
        allergens: &[String],
        service: &dyn SuggestionService,
        progress: &mut dyn FnMut(&str),
    ) -> Conversion {
        let suggestions = match self.suggestion_request(allergens, custom_rules) {
            Some(request) => match service.request_suggestions(&request, progress) {
                Ok(payload) => normalizer::normalize(&payload, &request.ingredients),
                Err(e) => {
                    warn!("提案なしで続行します: {}", e);
                    SuggestionMap::new()
                }
            },
            None => {
                debug!("アレルゲン未選択のため提案サービスを呼びません");
                SuggestionMap::new()
            }
        };

        self.convert(custom_rules, allergens, suggestions)
    }

    /// ルールを適用して変換結果を作る
    pub fn convert(
        &self,
        custom_rules: &[SubstitutionRule],
        allergens: &[String],
        suggestions: SuggestionMap,
    ) -> Conversion {
        let rules = RuleSet::merge(custom_rules, &suggestions);
        info!(
            "ルール適用: カスタム {}件 / 提案 {}件",
            rules.count_by_source(RuleSource::Custom),
            rules.count_by_source(RuleSource::Suggested)
        );

        let mut table = self.table.clone();
        let mut provenance = Vec::new();

        for cell in &self.meal_cells {
            let applied = engine::apply_parsed(cell.parsed(), &rules);
            if !applied.is_changed() {
                continue;
            }

            provenance.extend(
                applied
                    .substitutions
                    .iter()
                    .map(|sub| ProvenanceEntry::from_substitution(cell.coord, sub)),
            );
            set_cell(&mut table, cell.coord.row, cell.coord.col, applied.text);
        }

        let summary = build_summary(&self.meal_cells, &provenance);

        Conversion {
            table,
            provenance,
            summary,
            suggestions,
            fingerprint: self.fingerprint(allergens, custom_rules),
        }
    }
}

fn set_cell(table: &mut [Vec<String>], row: usize, col: usize, value: String) {
    if let Some(cell) = table.get_mut(row).and_then(|r| r.get_mut(col)) {
        *cell = value;
    }
}
