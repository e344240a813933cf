//! エラー型定義

use crate::types::{MealSlot, Weekday};
use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 週見出し列が1つも見つからない
    #[error("Structure error: no week column found (expected a header containing \"Week\")")]
    NoWeekColumns,

    /// 曜日行が5つ揃わない
    #[error("Structure error: weekday rows not found for {}", join_names(.missing))]
    MissingWeekdays { missing: Vec<Weekday> },

    /// セルに必要なマーカーがない
    #[error("Week {week} {day}: missing meal marker(s) {}", join_markers(.missing))]
    MissingSlot {
        week: u32,
        day: Weekday,
        missing: Vec<MealSlot>,
    },

    /// 献立セルが空
    #[error("Week {week} {day}: menu cell is empty")]
    EmptyCell { week: u32, day: Weekday },

    /// 提案サービスに接続できない（呼び出し側で「提案なし」として扱う）
    #[error("Suggestion service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl Error {
    /// 表の構造・セル内容に起因するエラーか
    pub fn is_table_error(&self) -> bool {
        matches!(
            self,
            Error::NoWeekColumns
                | Error::MissingWeekdays { .. }
                | Error::MissingSlot { .. }
                | Error::EmptyCell { .. }
        )
    }
}

fn join_names(days: &[Weekday]) -> String {
    days.iter().map(|d| d.name()).collect::<Vec<_>>().join(", ")
}

fn join_markers(slots: &[MealSlot]) -> String {
    slots
        .iter()
        .map(|s| format!("{}: ({})", s.code(), s.label()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
