//! Excel生成（共通ライブラリ）
//!
//! 変換後の献立表をそのままの形でシートに書き出し、
//! 置換された部分だけを赤字にする。

use crate::types::ProvenanceEntry;
use rust_xlsxwriter::*;
use std::ops::Range;

/// 列幅（文字数）
pub const COLUMN_WIDTH: f64 = 50.0;

/// 置換箇所の文字色
pub const HIGHLIGHT_COLOR: u32 = 0xFF0000;

/// セルテキストを (ハイライト有無, 区間) に分割する
///
/// 空区間は含めない。`spans` はバイト位置で、重なりのない前提。
pub fn highlight_segments(text: &str, spans: &[Range<usize>]) -> Vec<(bool, Range<usize>)> {
    let mut spans: Vec<Range<usize>> = spans
        .iter()
        .filter(|s| s.start < s.end && s.end <= text.len())
        .cloned()
        .collect();
    spans.sort_by_key(|s| s.start);

    let mut segments = Vec::new();
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor {
            continue;
        }
        if span.start > cursor {
            segments.push((false, cursor..span.start));
        }
        cursor = span.end;
        segments.push((true, span));
    }
    if cursor < text.len() {
        segments.push((false, cursor..text.len()));
    }
    segments
}

/// 献立表をExcelバッファに生成
///
/// # Arguments
/// * `table` - 変換後の表（行 × 列）
/// * `provenance` - 置換履歴（出力テキスト上の区間を赤字にする）
pub fn generate_menu_excel_buffer(
    table: &[Vec<String>],
    provenance: &[ProvenanceEntry],
) -> Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();

    let cell_format = Format::new()
        .set_text_wrap()
        .set_align(FormatAlign::Left)
        .set_align(FormatAlign::Top);
    let plain = Format::new();
    let red = Format::new().set_font_color(Color::RGB(HIGHLIGHT_COLOR));
    let red_cell = cell_format.clone().set_font_color(Color::RGB(HIGHLIGHT_COLOR));

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Menu")
        .map_err(|e| format!("シート名設定エラー: {}", e))?;

    let width = table.iter().map(Vec::len).max().unwrap_or(0);
    for col in 0..width {
        worksheet
            .set_column_width(column_index(col)?, COLUMN_WIDTH)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
    }

    for (row_idx, row) in table.iter().enumerate() {
        for (col_idx, text) in row.iter().enumerate() {
            if text.is_empty() {
                continue;
            }
            let (r, c) = (row_index(row_idx)?, column_index(col_idx)?);

            let spans: Vec<Range<usize>> = provenance
                .iter()
                .filter(|p| p.coord.row == row_idx && p.coord.col == col_idx)
                .map(|p| p.output_span.clone())
                .collect();
            let segments = highlight_segments(text, &spans);

            let written = match segments.as_slice() {
                [] | [(false, _)] => worksheet.write_string_with_format(r, c, text, &cell_format),
                [(true, _)] => worksheet.write_string_with_format(r, c, text, &red_cell),
                _ => {
                    let fragments: Vec<(&Format, &str)> = segments
                        .iter()
                        .map(|(hit, range)| (if *hit { &red } else { &plain }, &text[range.clone()]))
                        .collect();
                    worksheet.write_rich_string_with_format(r, c, &fragments, &cell_format)
                }
            };
            written.map_err(|e| format!("セル書き込みエラー ({}, {}): {}", row_idx, col_idx, e))?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}

fn row_index(row: usize) -> Result<u32, String> {
    u32::try_from(row).map_err(|_| format!("行番号が大きすぎます: {}", row))
}

fn column_index(col: usize) -> Result<u16, String> {
    u16::try_from(col).map_err(|_| format!("列番号が大きすぎます: {}", col))
}
