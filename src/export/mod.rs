pub mod excel;

use crate::error::{MenuAllergenError, Result};
use crate::table_io::TableFormat;
use menu_allergen_common::Conversion;
use std::path::{Path, PathBuf};

/// 出力先を決める（未指定なら `<入力名>_converted.<拡張子>`）
pub fn default_output_path(input: &Path, format: TableFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("menu");
    let extension = match format {
        TableFormat::Excel => "xlsx",
        TableFormat::Csv => "csv",
    };
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}_converted.{}", stem, extension))
}

/// 変換後の表を書き出す
pub fn export_conversion(conversion: &Conversion, format: TableFormat, output: &Path) -> Result<()> {
    match format {
        TableFormat::Excel => excel::generate_excel(&conversion.table, &conversion.provenance, output),
        TableFormat::Csv => write_csv(&conversion.table, output),
    }
}

/// 変更ログ・サマリ・置換履歴を JSON で書き出す
pub fn write_report(conversion: &Conversion, output: &Path) -> Result<()> {
    let report = serde_json::json!({
        "fingerprint": conversion.fingerprint,
        "changes": conversion.changes(),
        "summary": conversion.summary,
        "provenance": conversion.provenance,
        "suggestions": conversion.suggestions,
    });
    std::fs::write(output, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

fn write_csv(table: &[Vec<String>], output: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(output)
        .map_err(|e| MenuAllergenError::TableWrite(format!("{}: {}", output.display(), e)))?;

    for row in table {
        writer
            .write_record(row)
            .map_err(|e| MenuAllergenError::TableWrite(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
