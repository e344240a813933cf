//! 変換サマリ
//!
//! 置換履歴を週・曜日・食事区分ごとに集計し、
//! 置換された区分と置換されなかった区分の一覧を作る。

use crate::types::{MealCell, MealSlot, ProvenanceEntry, SlotLabel, Weekday};
use serde::Serialize;

/// 置換された区分
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacedSlot {
    pub week: u32,
    pub day: Weekday,
    pub slot: SlotLabel,
    pub original: String,
    pub replacement: String,
}

/// 置換されなかった区分
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreplacedSlot {
    pub week: u32,
    pub day: Weekday,
    pub slot: MealSlot,
    pub text: String,
}

/// 変換サマリ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub replaced: Vec<ReplacedSlot>,
    pub unreplaced: Vec<UnreplacedSlot>,
}

impl Summary {
    /// 区分別の置換件数
    pub fn replaced_count(&self, slot: MealSlot) -> usize {
        self.replaced
            .iter()
            .filter(|r| r.slot == SlotLabel::Slot(slot))
            .count()
    }
}

/// サマリを構築する
///
/// 週→曜日→区分（B/L/S）の順。置換履歴が1件でもある区分は「置換済み」とし、
/// 同じ区分内の他の食材が残っていても検査しない。
/// Unassigned の置換は各セルの末尾に並べる。
pub fn build_summary(cells: &[MealCell], provenance: &[ProvenanceEntry]) -> Summary {
    let mut ordered: Vec<&MealCell> = cells.iter().collect();
    ordered.sort_by_key(|c| (c.coord.week, c.coord.day));

    let mut summary = Summary::default();

    for cell in ordered {
        let entries: Vec<&ProvenanceEntry> = provenance
            .iter()
            .filter(|p| p.coord == cell.coord)
            .collect();

        let labels = MealSlot::ALL
            .iter()
            .map(|&s| SlotLabel::Slot(s))
            .chain(std::iter::once(SlotLabel::Unassigned));

        for label in labels {
            let mut hits = entries.iter().filter(|p| p.slot == label).peekable();

            if hits.peek().is_none() {
                if let SlotLabel::Slot(slot) = label {
                    summary.unreplaced.push(UnreplacedSlot {
                        week: cell.coord.week,
                        day: cell.coord.day,
                        slot,
                        text: cell.slot_text(slot),
                    });
                }
                continue;
            }

            for entry in hits {
                summary.replaced.push(ReplacedSlot {
                    week: cell.coord.week,
                    day: cell.coord.day,
                    slot: label,
                    original: entry.original.clone(),
                    replacement: entry.replacement.clone(),
                });
            }
        }
    }

    summary
}
