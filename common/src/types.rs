//! 献立表の型定義
//!
//! CLIとライブラリで共有される型:
//! - MealSlot: 1日のセル内の食事区分（B/L/S）
//! - Weekday: 献立表の曜日（月〜金）
//! - CellCoord: 献立セルの座標（週・曜日・行・列）
//! - SlotLabel: 置換箇所の食事区分（判定不能時は Unassigned）
//! - MealCell: 座標付きのパース済み献立セル
//! - ProvenanceEntry: 実際に行われた置換1件の記録

use crate::engine::Substitution;
use crate::tokenizer::ParsedCell;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// 食事区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Snack,
}

impl MealSlot {
    /// マーカー順の全区分
    pub const ALL: [MealSlot; 3] = [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Snack];

    /// マーカー文字（`B:` の `B`）
    pub fn code(&self) -> char {
        match self {
            MealSlot::Breakfast => 'B',
            MealSlot::Lunch => 'L',
            MealSlot::Snack => 'S',
        }
    }

    /// マーカー文字から区分を取得（大文字小文字を区別しない）
    pub fn from_code(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'B' => Some(MealSlot::Breakfast),
            'L' => Some(MealSlot::Lunch),
            'S' => Some(MealSlot::Snack),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::Lunch => "Lunch",
            MealSlot::Snack => "Snack",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 献立表の曜日
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
        }
    }

    /// 行ラベル照合用の大文字表記
    pub fn upper(&self) -> &'static str {
        match self {
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
        }
    }

    /// セルが曜日ラベルだけで構成されているか（"Monday" / "MONDAYS"）
    pub fn is_bare_label(text: &str) -> bool {
        let upper = text.trim().trim_end_matches(':').to_uppercase();
        Weekday::ALL
            .iter()
            .any(|d| upper == d.upper() || upper.strip_suffix('S') == Some(d.upper()))
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 献立セルの座標
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CellCoord {
    /// 週番号（1始まり）
    pub week: u32,
    pub day: Weekday,
    /// 元の表での行（0始まり）
    pub row: usize,
    /// 元の表での列（0始まり）
    pub col: usize,
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Week {} {}", self.week, self.day)
    }
}

/// 置換箇所の食事区分
///
/// マーカー区間に含まれない位置での置換は Unassigned になる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub enum SlotLabel {
    Slot(MealSlot),
    Unassigned,
}

impl SlotLabel {
    pub fn slot(&self) -> Option<MealSlot> {
        match self {
            SlotLabel::Slot(slot) => Some(*slot),
            SlotLabel::Unassigned => None,
        }
    }
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotLabel::Slot(slot) => f.write_str(slot.label()),
            SlotLabel::Unassigned => f.write_str("Unassigned"),
        }
    }
}

impl From<SlotLabel> for String {
    fn from(label: SlotLabel) -> Self {
        label.to_string()
    }
}

impl From<MealSlot> for SlotLabel {
    fn from(slot: MealSlot) -> Self {
        SlotLabel::Slot(slot)
    }
}

/// 座標付きの献立セル（パース後は変更しない）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealCell {
    pub coord: CellCoord,
    cell: ParsedCell,
}

impl MealCell {
    pub fn new(coord: CellCoord, cell: ParsedCell) -> Self {
        Self { coord, cell }
    }

    pub fn raw(&self) -> &str {
        self.cell.raw()
    }

    pub fn parsed(&self) -> &ParsedCell {
        &self.cell
    }

    /// 区分コード → テキスト
    pub fn meal_parts(&self) -> BTreeMap<MealSlot, String> {
        self.cell.slots()
    }

    pub fn slot_text(&self, slot: MealSlot) -> String {
        self.cell.slot_text(slot).unwrap_or_default()
    }
}

/// 置換履歴1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceEntry {
    pub coord: CellCoord,
    pub slot: SlotLabel,
    /// 原文にそのまま現れた文字列
    pub original: String,
    pub replacement: String,
    /// 置換後セルテキスト上の区間（ハイライト用、バイト位置）
    pub output_span: Range<usize>,
}

impl ProvenanceEntry {
    pub fn from_substitution(coord: CellCoord, sub: &Substitution) -> Self {
        Self {
            coord,
            slot: sub.slot,
            original: sub.matched.clone(),
            replacement: sub.replacement.clone(),
            output_span: sub.output_span.clone(),
        }
    }

    /// 変更ログ1行
    pub fn describe(&self) -> String {
        format!(
            "Changed '{}' to '{}' in {} ({})",
            self.original, self.replacement, self.slot, self.coord
        )
    }
}
