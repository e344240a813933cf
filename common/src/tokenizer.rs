//! 献立セルのトークナイザ
//!
//! 1セルの生テキストから食事区分ごとのテキストと食材トークンを取り出す。
//!
//! マーカーは「1文字 + コロン」（`B:` / `L:` / `S:`、大文字小文字を区別しない）。
//! 行頭に限らず行の途中にも現れるため、区分のテキストは
//! マーカー直後から次のマーカー（どの区分でも）の直前までとする。

use crate::types::{MealSlot, SlotLabel};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

/// セル単位のパースエラー（座標は呼び出し側で付与する）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellParseError {
    /// 空または空白のみのセル
    Empty,
    /// 見つからなかった区分
    MissingSlots(Vec<MealSlot>),
}

/// マーカー1つ分の区間
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSpan {
    pub slot: MealSlot,
    /// マーカー文字の位置
    pub marker_start: usize,
    /// テキスト区間（マーカー直後〜次のマーカー直前、バイト位置）
    pub text: Range<usize>,
}

/// パース済みセル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCell {
    raw: String,
    spans: Vec<SlotSpan>,
}

impl ParsedCell {
    /// マーカー区間を走査する（必須区分の検証はしない）
    pub fn scan(raw: &str) -> Self {
        let markers = find_markers(raw);
        let spans = markers
            .iter()
            .enumerate()
            .map(|(i, &(slot, marker_start, text_start))| {
                let end = markers.get(i + 1).map_or(raw.len(), |next| next.1);
                SlotSpan {
                    slot,
                    marker_start,
                    text: text_start..end,
                }
            })
            .collect();

        Self {
            raw: raw.to_string(),
            spans,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// マーカー出現順の区間
    pub fn spans(&self) -> &[SlotSpan] {
        &self.spans
    }

    /// 区分のテキスト（同じマーカーが複数回あればスペースで連結）
    pub fn slot_text(&self, slot: MealSlot) -> Option<String> {
        let parts: Vec<&str> = self
            .spans
            .iter()
            .filter(|s| s.slot == slot)
            .map(|s| self.raw[s.text.clone()].trim())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// 区分コード → テキスト
    pub fn slots(&self) -> BTreeMap<MealSlot, String> {
        MealSlot::ALL
            .iter()
            .filter_map(|&slot| self.slot_text(slot).map(|text| (slot, text)))
            .collect()
    }

    /// 見つからなかった区分
    pub fn missing_slots(&self) -> Vec<MealSlot> {
        MealSlot::ALL
            .iter()
            .copied()
            .filter(|slot| !self.spans.iter().any(|s| s.slot == *slot))
            .collect()
    }

    /// バイト位置が属する区分
    pub fn slot_at(&self, offset: usize) -> SlotLabel {
        self.spans
            .iter()
            .find(|s| s.text.start <= offset && offset < s.text.end)
            .map_or(SlotLabel::Unassigned, |s| SlotLabel::Slot(s.slot))
    }

    /// 区分ごとの食材トークン
    pub fn ingredients(&self, slot: MealSlot) -> Vec<String> {
        self.slot_text(slot)
            .map(|text| tokenize_ingredients(&text))
            .unwrap_or_default()
    }
}

/// セルをパースする
///
/// # Returns
/// * `Ok(ParsedCell)` - B/L/S すべてのマーカーがある
/// * `Err(CellParseError::Empty)` - 空セル
/// * `Err(CellParseError::MissingSlots)` - 足りない区分がある
pub fn parse_cell(raw: &str) -> Result<ParsedCell, CellParseError> {
    if raw.trim().is_empty() {
        return Err(CellParseError::Empty);
    }

    let cell = ParsedCell::scan(raw);
    let missing = cell.missing_slots();
    if !missing.is_empty() {
        return Err(CellParseError::MissingSlots(missing));
    }

    Ok(cell)
}

/// マーカーを検出する: (区分, マーカー位置, テキスト開始位置)
///
/// 直前が英数字の場合（"Fruits:" の "s:" など）はマーカーとみなさない
fn find_markers(text: &str) -> Vec<(MealSlot, usize, usize)> {
    let mut markers = Vec::new();
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let at_boundary = prev.map_or(true, |p| !p.is_alphanumeric());
        if at_boundary {
            if let Some(slot) = MealSlot::from_code(ch) {
                if let Some(&(colon_idx, ':')) = chars.peek() {
                    markers.push((slot, idx, colon_idx + 1));
                }
            }
        }
        prev = Some(ch);
    }

    markers
}

/// 区分テキストを食材トークンに分割する
///
/// 区切り: `,` `;` `&` `+` `/` `and` `with` `w/` 改行
pub fn tokenize_ingredients(text: &str) -> Vec<String> {
    lazy_static::lazy_static! {
        static ref SEPARATOR_RE: Regex =
            Regex::new(r"(?i)\s*(?:\bw/|[,;&+/\n]|\band\b|\bwith\b)\s*").unwrap();
    }

    let mut seen = HashSet::new();
    SEPARATOR_RE
        .split(text)
        .map(|t| t.trim().trim_matches(|c: char| c == '"' || c == '.'))
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CELL: &str = "B: Milk toast\nL: Cheese sandwich\nS: Crackers";

    #[test]
    fn test_parse_cell_three_slots() {
        let cell = parse_cell(CELL).unwrap();
        let slots = cell.slots();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[&MealSlot::Breakfast], "Milk toast");
        assert_eq!(slots[&MealSlot::Lunch], "Cheese sandwich");
        assert_eq!(slots[&MealSlot::Snack], "Crackers");
    }

    #[test]
    fn test_parse_cell_markers_mid_line() {
        let cell = parse_cell("B: Cereal L: Pizza\ns: Apple slices").unwrap();
        assert_eq!(cell.slot_text(MealSlot::Breakfast).unwrap(), "Cereal");
        assert_eq!(cell.slot_text(MealSlot::Lunch).unwrap(), "Pizza");
        assert_eq!(cell.slot_text(MealSlot::Snack).unwrap(), "Apple slices");
    }

    #[test]
    fn test_parse_cell_continuation_lines_stay_in_slot() {
        let cell = parse_cell("B: Pancakes\nwith syrup\nL: Tacos\nS: Fruit").unwrap();
        let breakfast = cell.slot_text(MealSlot::Breakfast).unwrap();
        assert!(breakfast.starts_with("Pancakes"));
        assert!(breakfast.ends_with("with syrup"));
    }

    #[test]
    fn test_parse_cell_ignores_colon_after_word() {
        // "Fruits:" の "s:" はマーカーではない
        let cell = parse_cell("B: Fruits: apple\nL: Soup\nS: Yogurt").unwrap();
        assert_eq!(cell.slot_text(MealSlot::Breakfast).unwrap(), "Fruits: apple");
    }

    #[test]
    fn test_parse_cell_adjacent_markers() {
        let cell = ParsedCell::scan("B:L:S:");
        assert_eq!(cell.spans().len(), 3);
        assert!(cell.missing_slots().is_empty());
    }

    #[test]
    fn test_parse_cell_missing_slot() {
        let err = parse_cell("B: Toast\nL: Soup").unwrap_err();
        assert_eq!(err, CellParseError::MissingSlots(vec![MealSlot::Snack]));
    }

    #[test]
    fn test_parse_cell_empty() {
        assert_eq!(parse_cell("   \n ").unwrap_err(), CellParseError::Empty);
        assert_eq!(parse_cell("").unwrap_err(), CellParseError::Empty);
    }

    #[test]
    fn test_span_boundaries_round_trip() {
        let raw = "  b: Eggs L: Rice\n S: Grapes ";
        let cell = parse_cell(raw).unwrap();
        // マーカー区間を順に連結すると最初のマーカー以降の原文に戻る
        let rebuilt: String = cell
            .spans()
            .iter()
            .map(|s| &raw[s.marker_start..s.text.end])
            .collect();
        assert_eq!(rebuilt, &raw[cell.spans()[0].marker_start..]);
    }

    #[test]
    fn test_slot_at_offsets() {
        let cell = parse_cell(CELL).unwrap();
        let lunch_pos = CELL.find("Cheese").unwrap();
        assert_eq!(cell.slot_at(lunch_pos), SlotLabel::Slot(MealSlot::Lunch));
        assert_eq!(cell.slot_at(0), SlotLabel::Unassigned);
    }

    #[test]
    fn test_tokenize_ingredients() {
        let tokens = tokenize_ingredients("Turkey & Cheese sandwich, milk w/ carrots and ranch");
        assert_eq!(tokens, vec!["Turkey", "Cheese sandwich", "milk", "carrots", "ranch"]);
    }

    #[test]
    fn test_tokenize_ingredients_dedupes_case_insensitively() {
        let tokens = tokenize_ingredients("Milk, milk; MILK");
        assert_eq!(tokens, vec!["Milk"]);
    }
}
