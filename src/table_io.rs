//! 献立表ファイルの読み込み
//!
//! - xlsx / xlsm / xls / ods: 先頭シートを calamine で読む
//! - csv: ヘッダなし・列数可変で読む
//!
//! どちらも「行 × 列」の文字列グリッドに変換する。
//! シートの使用範囲が A1 から始まらない場合は空セルで埋めて
//! 元の行・列番号を保つ。

use crate::error::{MenuAllergenError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::debug;

/// 入出力ファイルの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Excel,
    Csv,
}

impl TableFormat {
    /// 拡張子から判定
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(TableFormat::Excel),
            "csv" => Ok(TableFormat::Csv),
            _ => Err(MenuAllergenError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// 表ファイルを読み込む
pub fn read_table(path: &Path) -> Result<Vec<Vec<String>>> {
    if !path.exists() {
        return Err(MenuAllergenError::FileNotFound(path.display().to_string()));
    }

    let table = match TableFormat::from_path(path)? {
        TableFormat::Excel => read_workbook(path)?,
        TableFormat::Csv => read_csv(path)?,
    };

    debug!(
        "{}: {}行 x {}列",
        path.display(),
        table.len(),
        table.iter().map(Vec::len).max().unwrap_or(0)
    );
    Ok(table)
}

fn read_workbook(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| MenuAllergenError::TableRead(format!("{}: {}", path.display(), e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| MenuAllergenError::TableRead(format!("{}: シートがありません", path.display())))?
        .map_err(|e| MenuAllergenError::TableRead(format!("{}: {}", path.display(), e)))?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let (start_row, start_col) = (start_row as usize, start_col as usize);

    let mut table: Vec<Vec<String>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![String::new(); start_col];
        cells.extend(row.iter().map(cell_text));
        table.push(cells);
    }
    Ok(table)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // 整数値の浮動小数は "1.0" ではなく "1" にする
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| MenuAllergenError::TableRead(format!("{}: {}", path.display(), e)))?;

    let mut table = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| MenuAllergenError::TableRead(e.to_string()))?;
        table.push(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}
