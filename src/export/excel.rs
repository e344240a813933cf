//! Excel生成（CLI版）
//!
//! 共通ライブラリでバッファを作りファイルに書き出す

use crate::error::{MenuAllergenError, Result};
use menu_allergen_common::export::excel_core::generate_menu_excel_buffer;
use menu_allergen_common::ProvenanceEntry;
use std::path::Path;

pub fn generate_excel(
    table: &[Vec<String>],
    provenance: &[ProvenanceEntry],
    output_path: &Path,
) -> Result<()> {
    let buffer = generate_menu_excel_buffer(table, provenance)
        .map_err(MenuAllergenError::ExcelGeneration)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, buffer)?;
    Ok(())
}
