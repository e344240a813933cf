//! 献立表の週・曜日グリッド検出
//!
//! 任意の形の表から週見出し列と曜日行を探し、
//! 献立セルを (週, 曜日, 行, 列) で参照できるようにする。

use crate::error::{Error, Result};
use crate::types::Weekday;
use regex::Regex;
use tracing::debug;

/// 週見出し列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekColumn {
    pub col: usize,
    /// 週番号（左から1始まり）
    pub week: u32,
    /// 見出しに書かれた番号（"Week 3" なら 3）
    pub header_number: Option<u32>,
}

/// 曜日行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRow {
    pub row: usize,
    pub day: Weekday,
}

/// 検出したグリッド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub week_columns: Vec<WeekColumn>,
    /// 月〜金の順
    pub day_rows: Vec<DayRow>,
}

impl TableLayout {
    /// 献立セル座標を週→曜日の順に列挙
    pub fn coordinates(&self) -> impl Iterator<Item = (&WeekColumn, &DayRow)> + '_ {
        self.week_columns
            .iter()
            .flat_map(move |w| self.day_rows.iter().map(move |d| (w, d)))
    }
}

/// セル値を取得（範囲外は空文字）
pub fn cell_at(grid: &[Vec<String>], row: usize, col: usize) -> &str {
    grid.get(row)
        .and_then(|r| r.get(col))
        .map(String::as_str)
        .unwrap_or("")
}

/// 表から週・曜日グリッドを検出する
///
/// - 週列: 列内のいずれかのセルが "week" を含む（大文字小文字を区別しない）
/// - 曜日行: 空でないセルを連結して大文字化した文字列が曜日名を含む
///   （"MONDAYS" のような複数形も部分一致で拾う）
/// - 曜日ラベルだけが並ぶ列は週列から除外する
///
/// # Errors
/// * `Error::NoWeekColumns` - 週列が見つからない
/// * `Error::MissingWeekdays` - 曜日行が5つ揃わない
pub fn locate(grid: &[Vec<String>]) -> Result<TableLayout> {
    let candidates = find_week_columns(grid);
    if candidates.is_empty() {
        return Err(Error::NoWeekColumns);
    }

    let day_rows = find_day_rows(grid)?;

    let label_columns: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&col| {
            day_rows
                .iter()
                .all(|d| Weekday::is_bare_label(cell_at(grid, d.row, col)))
        })
        .collect();

    let week_columns: Vec<WeekColumn> = candidates
        .iter()
        .copied()
        .filter(|col| !label_columns.contains(col))
        .enumerate()
        .map(|(i, col)| WeekColumn {
            col,
            week: i as u32 + 1,
            header_number: header_number(grid, col),
        })
        .collect();

    if week_columns.is_empty() {
        return Err(Error::NoWeekColumns);
    }

    debug!(
        "週列 {:?} / 曜日行 {:?}",
        week_columns.iter().map(|w| w.col).collect::<Vec<_>>(),
        day_rows.iter().map(|d| d.row).collect::<Vec<_>>()
    );

    Ok(TableLayout {
        week_columns,
        day_rows,
    })
}

fn find_week_columns(grid: &[Vec<String>]) -> Vec<usize> {
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .filter(|&col| {
            grid.iter()
                .any(|row| row.get(col).is_some_and(|c| c.to_lowercase().contains("week")))
        })
        .collect()
}

fn find_day_rows(grid: &[Vec<String>]) -> Result<Vec<DayRow>> {
    let mut found: Vec<Option<usize>> = vec![None; Weekday::ALL.len()];

    for (row_idx, row) in grid.iter().enumerate() {
        let joined = row
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        if joined.is_empty() {
            continue;
        }

        // 1行が受け持つ曜日は1つ。文中で最初に現れる未割当の曜日を採用する
        let earliest = Weekday::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| found[*i].is_none())
            .filter_map(|(i, day)| joined.find(day.upper()).map(|pos| (pos, i)))
            .min();

        if let Some((_, day_idx)) = earliest {
            found[day_idx] = Some(row_idx);
        }
    }

    let missing: Vec<Weekday> = Weekday::ALL
        .iter()
        .zip(&found)
        .filter(|(_, row)| row.is_none())
        .map(|(day, _)| *day)
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingWeekdays { missing });
    }

    Ok(Weekday::ALL
        .iter()
        .zip(found)
        .filter_map(|(day, row)| row.map(|row| DayRow { row, day: *day }))
        .collect())
}

fn header_number(grid: &[Vec<String>], col: usize) -> Option<u32> {
    lazy_static::lazy_static! {
        static ref WEEK_NUMBER_RE: Regex = Regex::new(r"(?i)week\s*#?\s*(\d+)").unwrap();
    }

    grid.iter()
        .filter_map(|row| row.get(col))
        .find_map(|c| WEEK_NUMBER_RE.captures(c).and_then(|cap| cap[1].parse().ok()))
}
