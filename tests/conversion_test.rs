//! 変換パイプラインの結合テスト
//!
//! 4週 × 5日の献立表をスタブの提案サービスで変換し、
//! 置換結果・サマリ・出力ファイルを検証する

use menu_allergen_common::{
    Error, MealSlot, MenuProcessor, SubstitutionRule, SuggestionRequest, SuggestionService, Weekday,
};
use menu_allergen_rust::export;
use menu_allergen_rust::table_io::{self, TableFormat};
use std::cell::{Cell, RefCell};
use tempfile::tempdir;

const CELL: &str = "B: Milk toast\nL: Cheese sandwich\nS: Crackers";

/// 見出し行 + 曜日ラベル列の4週分の献立表
fn four_week_table() -> Vec<Vec<String>> {
    let mut table = vec![vec![
        "".to_string(),
        "Week 1".to_string(),
        "Week 2".to_string(),
        "Week 3".to_string(),
        "Week 4".to_string(),
    ]];
    for day in Weekday::ALL {
        let mut row = vec![day.name().to_string()];
        row.extend((0..4).map(|_| CELL.to_string()));
        table.push(row);
    }
    table
}

/// 固定の応答を返すスタブ
struct StubService {
    payload: Result<&'static str, &'static str>,
    calls: Cell<usize>,
    last_prompt: RefCell<String>,
}

impl StubService {
    fn ok(payload: &'static str) -> Self {
        Self {
            payload: Ok(payload),
            calls: Cell::new(0),
            last_prompt: RefCell::new(String::new()),
        }
    }

    fn unavailable() -> Self {
        Self {
            payload: Err("connection refused"),
            calls: Cell::new(0),
            last_prompt: RefCell::new(String::new()),
        }
    }
}

impl SuggestionService for StubService {
    fn request_suggestions(
        &self,
        request: &SuggestionRequest,
        progress: &mut dyn FnMut(&str),
    ) -> menu_allergen_common::Result<String> {
        self.calls.set(self.calls.get() + 1);
        *self.last_prompt.borrow_mut() = request.prompt.clone();
        match self.payload {
            Ok(payload) => {
                progress("thinking...");
                Ok(payload.to_string())
            }
            Err(reason) => Err(Error::ServiceUnavailable(reason.to_string())),
        }
    }
}

/// 4週分の献立をDairyで変換
#[test]
fn test_four_week_dairy_conversion() {
    let processor = MenuProcessor::new(four_week_table()).expect("構造検出失敗");
    let service = StubService::ok(r#"{"Cheese": "Vegan cheese"}"#);

    let conversion = processor.convert_menu(
        &[SubstitutionRule::custom("Milk", "Soy milk")],
        &["Dairy".to_string()],
        &service,
        &mut |_| {},
    );

    // 表全体で1回だけ問い合わせる
    assert_eq!(service.calls.get(), 1);
    assert!(service.last_prompt.borrow().contains("Milk toast"));

    assert_eq!(conversion.summary.replaced_count(MealSlot::Breakfast), 20);
    assert_eq!(conversion.summary.replaced_count(MealSlot::Lunch), 20);
    assert_eq!(conversion.summary.replaced_count(MealSlot::Snack), 0);
    assert_eq!(conversion.summary.unreplaced.len(), 20);

    for row in &conversion.table[1..] {
        for cell in &row[1..] {
            assert_eq!(cell, "B: Soy milk toast\nL: Vegan cheese sandwich\nS: Crackers");
        }
    }

    let changes = conversion.changes();
    assert_eq!(changes[0], "Changed 'Milk' to 'Soy milk' in Breakfast (Week 1 Monday)");
}

/// アレルゲン未選択ならサービスを呼ばない
#[test]
fn test_no_allergens_skips_service() {
    let processor = MenuProcessor::new(four_week_table()).unwrap();
    let service = StubService::ok(r#"{"Cheese": "Vegan cheese"}"#);

    let conversion = processor.convert_menu(
        &[SubstitutionRule::custom("Milk", "Soy milk")],
        &[],
        &service,
        &mut |_| {},
    );

    assert_eq!(service.calls.get(), 0);
    assert_eq!(conversion.summary.replaced_count(MealSlot::Breakfast), 20);
    assert_eq!(conversion.summary.replaced_count(MealSlot::Lunch), 0);
}

/// サービス停止時もカスタムルールは適用される
#[test]
fn test_unavailable_service_degrades_to_custom_rules() {
    let processor = MenuProcessor::new(four_week_table()).unwrap();
    let service = StubService::unavailable();

    let conversion = processor.convert_menu(
        &[SubstitutionRule::custom("Milk", "Soy milk")],
        &["Dairy".to_string()],
        &service,
        &mut |_| {},
    );

    assert_eq!(service.calls.get(), 1);
    assert!(conversion.suggestions.is_empty());
    assert_eq!(conversion.summary.replaced_count(MealSlot::Breakfast), 20);
    assert_eq!(conversion.summary.replaced_count(MealSlot::Lunch), 0);
}

/// 不正な応答は「提案なし」として扱う
#[test]
fn test_malformed_response_is_ignored() {
    let processor = MenuProcessor::new(four_week_table()).unwrap();
    let service = StubService::ok("I cannot help with that.");

    let conversion = processor.convert_menu(&[], &["Dairy".to_string()], &service, &mut |_| {});

    assert!(conversion.suggestions.is_empty());
    assert!(conversion.provenance.is_empty());
    assert_eq!(conversion.table, four_week_table());
}

/// ID付きストリーム応答
#[test]
fn test_streamed_id_response() {
    let processor = MenuProcessor::new(four_week_table()).unwrap();
    let payload = "Looking at the menu...\n===JSON===\n[{\"id\": \"ing_3\", \"substitution\": \"Rice cakes\"}]";
    let service = StubService::ok(payload);

    let conversion = processor.convert_menu(&[], &["Gluten".to_string()], &service, &mut |_| {});

    assert_eq!(conversion.suggestions.get("Crackers").map(String::as_str), Some("Rice cakes"));
    assert_eq!(conversion.summary.replaced_count(MealSlot::Snack), 20);
}

/// 構造エラーは座標付きで返る
#[test]
fn test_missing_marker_reports_coordinates() {
    let mut table = four_week_table();
    table[3][4] = "B: Eggs\nS: Fruit".to_string();

    let err = MenuProcessor::new(table).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Week 4 Wednesday: missing meal marker(s) L: (Lunch)"
    );
}

/// CSVで読み込み、Excelに書き出して読み戻す
#[test]
fn test_csv_to_excel_roundtrip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let input = dir.path().join("menu.csv");

    let mut writer = csv::Writer::from_path(&input).unwrap();
    for row in four_week_table() {
        writer.write_record(&row).unwrap();
    }
    writer.flush().unwrap();

    let table = table_io::read_table(&input).unwrap();
    let processor = MenuProcessor::new(table).unwrap();
    let conversion = processor.convert(
        &[SubstitutionRule::custom("Crackers", "Apple slices")],
        &[],
        Default::default(),
    );

    let output = export::default_output_path(&input, TableFormat::Excel);
    assert_eq!(output.file_name().unwrap(), "menu_converted.xlsx");
    export::export_conversion(&conversion, TableFormat::Excel, &output).unwrap();

    let reloaded = table_io::read_table(&output).unwrap();
    assert_eq!(reloaded[0][1], "Week 1");
    assert_eq!(
        reloaded[5][4],
        "B: Milk toast\nL: Cheese sandwich\nS: Apple slices"
    );
}

/// レポートJSON
#[test]
fn test_write_report() {
    let dir = tempdir().expect("Failed to create temp dir");
    let processor = MenuProcessor::new(four_week_table()).unwrap();
    let conversion = processor.convert(
        &[SubstitutionRule::custom("Milk", "Oat milk")],
        &[],
        Default::default(),
    );

    let path = dir.path().join("report.json");
    export::write_report(&conversion, &path).unwrap();

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["changes"].as_array().unwrap().len(), 20);
    assert_eq!(report["summary"]["replaced"][0]["slot"], "Breakfast");
    assert_eq!(report["fingerprint"].as_str().unwrap().len(), 64);
}
