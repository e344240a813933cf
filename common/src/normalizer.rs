//! 提案サービスのレスポンス正規化
//!
//! 外部の提案サービスが返すペイロードを「原文 → 置換後」のマップに変換する。
//!
//! 対応する形式（優先順）:
//! 1. `{original, substitution}` レコードの配列
//! 2. 配列を `meals` / `substitutions` などのキーで包んだオブジェクト
//! 3. `{id, substitution}` レコードの配列（id は食材IDテーブルで原文に解決）
//! 4. ストリーム: 前置きのテキスト → `===JSON===` 行 → JSON配列 → 後続ノイズ
//!
//! 何も取り出せない場合は空マップを返す（エラーにしない）。

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 原文 → 置換後
pub type SuggestionMap = BTreeMap<String, String>;

/// ストリーム出力でJSONの直前に置かれるマーカー行
pub const STREAM_MARKER: &str = "===JSON===";

/// 配列を包むキーとして認識するもの
const WRAPPER_KEYS: &[&str] = &["meals", "substitutions", "suggestions", "items", "results"];

/// 食材IDテーブル（リクエスト前に呼び出し側で構築する）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngredientTable {
    entries: Vec<(String, String)>,
}

impl IngredientTable {
    /// 順序を保ったまま `ing_1`, `ing_2`, ... を振る（大文字小文字を無視して重複排除）
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<(String, String)> = Vec::new();
        for text in texts {
            let text = text.as_ref().trim();
            if text.is_empty()
                || entries
                    .iter()
                    .any(|(_, existing)| existing.eq_ignore_ascii_case(text))
            {
                continue;
            }
            entries.push((format!("ing_{}", entries.len() + 1), text.to_string()));
        }
        Self { entries }
    }

    pub fn lookup(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, text)| text.as_str())
    }

    /// (id, 原文) の一覧
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// 原文のみ（ID順）
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, t)| t.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// ペイロードの形
#[derive(Debug)]
enum PayloadShape<'a> {
    /// レコード配列（original / id どちらのレコードも含む）
    Records(&'a [Value]),
    /// キーで包まれたレコード配列
    Wrapped(&'static str, &'a [Value]),
    /// `{"原文": "置換後"}` の平坦なマップ
    Flat(&'a Map<String, Value>),
}

/// ペイロード文字列を正規化する
pub fn normalize(payload: &str, ids: &IngredientTable) -> SuggestionMap {
    let body = after_stream_marker(payload);

    if let Ok(value) = serde_json::from_str::<Value>(body.trim()) {
        let map = normalize_value(&value, ids);
        if !map.is_empty() {
            return map;
        }
    }

    // 先頭から '[' / '{' ごとに完結したJSON値を探す
    for (start, ch) in body.char_indices() {
        if ch != '[' && ch != '{' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&body[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            let map = normalize_value(&value, ids);
            if !map.is_empty() {
                debug!("位置 {} のJSONから {}件の提案を抽出", start, map.len());
                return map;
            }
        }
    }

    if !payload.trim().is_empty() {
        warn!("提案レスポンスから有効なレコードを抽出できませんでした（{} bytes）", payload.len());
    }
    SuggestionMap::new()
}

/// ストリームのチャンク列を正規化する
pub fn normalize_chunks<I, S>(chunks: I, ids: &IngredientTable) -> SuggestionMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined: String = chunks.into_iter().map(|c| c.as_ref().to_string()).collect();
    normalize(&joined, ids)
}

/// パース済みJSON値を正規化する
pub fn normalize_value(value: &Value, ids: &IngredientTable) -> SuggestionMap {
    let mut map = SuggestionMap::new();

    match classify(value) {
        Some(PayloadShape::Records(records)) => {
            debug!("提案形式: レコード配列 ({}件)", records.len());
            collect_records(records, ids, &mut map);
        }
        Some(PayloadShape::Wrapped(key, records)) => {
            debug!("提案形式: '{}' で包まれた配列 ({}件)", key, records.len());
            collect_records(records, ids, &mut map);
        }
        Some(PayloadShape::Flat(object)) => {
            debug!("提案形式: 平坦なマップ ({}件)", object.len());
            for (original, replacement) in object {
                if let Some(replacement) = replacement.as_str() {
                    insert_pair(&mut map, original, replacement);
                }
            }
        }
        None => {}
    }

    map
}

fn classify(value: &Value) -> Option<PayloadShape<'_>> {
    match value {
        Value::Array(records) => Some(PayloadShape::Records(records)),
        Value::Object(object) => {
            for key in WRAPPER_KEYS {
                if let Some(Value::Array(records)) = object.get(*key) {
                    return Some(PayloadShape::Wrapped(*key, records));
                }
            }
            // 単一レコードを配列扱いにはしない。文字列値だけのオブジェクトは平坦マップ
            if !object.is_empty() && object.values().all(Value::is_string) && !is_record(object) {
                return Some(PayloadShape::Flat(object));
            }
            None
        }
        _ => None,
    }
}

fn collect_records(records: &[Value], ids: &IngredientTable, map: &mut SuggestionMap) {
    let mut dropped = 0;
    for record in records {
        match resolve_record(record, ids) {
            // 後のレコードが前を上書きする
            Some((original, replacement)) => insert_pair(map, &original, &replacement),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("不完全なレコード {}件を破棄", dropped);
    }
}

/// レコードを (原文, 置換後) に解決する
///
/// id が食材IDテーブルで解決できればその原文を、できなければ original を使う
fn resolve_record(record: &Value, ids: &IngredientTable) -> Option<(String, String)> {
    let object = record.as_object()?;
    let replacement = text_field(object, &["substitution", "replacement"])?;

    let by_id = id_field(object).and_then(|id| ids.lookup(&id).map(str::to_string));
    let original = match by_id {
        Some(text) => text,
        None => text_field(object, &["original", "ingredient"])?,
    };

    Some((original, replacement))
}

fn is_record(object: &Map<String, Value>) -> bool {
    ["substitution", "replacement", "original", "id"]
        .iter()
        .any(|k| object.contains_key(*k))
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn id_field(object: &Map<String, Value>) -> Option<String> {
    match object.get("id")? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(format!("ing_{}", n)),
        _ => None,
    }
}

fn insert_pair(map: &mut SuggestionMap, original: &str, replacement: &str) {
    let original = original.trim();
    let replacement = replacement.trim();
    // 原文と同じ置換は捨てる
    if original.is_empty() || replacement.is_empty() || original == replacement {
        return;
    }
    map.insert(original.to_string(), replacement.to_string());
}

/// マーカー行より後ろを返す（マーカーがなければ全体）
fn after_stream_marker(payload: &str) -> &str {
    match payload.rfind(STREAM_MARKER) {
        Some(pos) => &payload[pos + STREAM_MARKER.len()..],
        None => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_ids() -> IngredientTable {
        IngredientTable::default()
    }

    #[test]
    fn test_normalize_wrapped_substitutions() {
        let payload = r#"{"substitutions":[{"original":"Milk","substitution":"Soy milk"}]}"#;
        let map = normalize(payload, &no_ids());
        assert_eq!(map.len(), 1);
        assert_eq!(map["Milk"], "Soy milk");
    }

    #[test]
    fn test_normalize_wrapped_meals() {
        let payload = r#"{"meals":[{"original":"Cheese pizza","substitution":"Veggie pizza"}]}"#;
        let map = normalize(payload, &no_ids());
        assert_eq!(map["Cheese pizza"], "Veggie pizza");
    }

    #[test]
    fn test_normalize_direct_array() {
        let payload = r#"[{"original":"Bread","substitution":"GF bread"},{"original":"Pasta","substitution":"Rice"}]"#;
        let map = normalize(payload, &no_ids());
        assert_eq!(map.len(), 2);
        assert_eq!(map["Pasta"], "Rice");
    }

    #[test]
    fn test_normalize_id_referenced() {
        let ids = IngredientTable::from_texts(["Rice noodles"]);
        let payload = r#"[{"id":"ing_1","substitution":"Brown rice"}]"#;
        let map = normalize(payload, &ids);
        assert_eq!(map.len(), 1);
        assert_eq!(map["Rice noodles"], "Brown rice");
    }

    #[test]
    fn test_normalize_unknown_id_is_dropped() {
        let ids = IngredientTable::from_texts(["Rice noodles"]);
        let payload = r#"[{"id":"ing_9","substitution":"Brown rice"},{"id":"ing_1","substitution":"Rice"}]"#;
        let map = normalize(payload, &ids);
        assert_eq!(map.len(), 1);
        assert_eq!(map["Rice noodles"], "Rice");
    }

    #[test]
    fn test_normalize_last_record_per_id_wins() {
        let ids = IngredientTable::from_texts(["Fish sticks"]);
        let payload = r#"[{"id":"ing_1","substitution":"Chicken strips"},{"id":"ing_1","substitution":"Bean patty"}]"#;
        let map = normalize(payload, &ids);
        assert_eq!(map["Fish sticks"], "Bean patty");
    }

    #[test]
    fn test_normalize_stream_marker_discards_preamble() {
        let payload = "Thinking about dairy... [not json]\nThe answer follows.\n===JSON===\n[{\"original\":\"Cheese\",\"substitution\":\"Vegan cheese\"}]";
        let map = normalize(payload, &no_ids());
        assert_eq!(map.len(), 1);
        assert_eq!(map["Cheese"], "Vegan cheese");
    }

    #[test]
    fn test_normalize_trailing_noise_after_array() {
        let payload = "===JSON===\n[{\"original\":\"Egg\",\"substitution\":\"Tofu scramble\"}]\nHope this helps! ]]";
        let map = normalize(payload, &no_ids());
        assert_eq!(map["Egg"], "Tofu scramble");
    }

    #[test]
    fn test_normalize_chunks() {
        let chunks = vec![
            "Checking allergens",
            "...\n===JS",
            "ON===\n[{\"original\":\"Yogurt\",",
            "\"substitution\":\"Coconut yogurt\"}]",
        ];
        let map = normalize_chunks(chunks, &no_ids());
        assert_eq!(map["Yogurt"], "Coconut yogurt");
    }

    #[test]
    fn test_normalize_code_fence() {
        let payload = "Here you go:\n```json\n{\"meals\": [{\"original\": \"Butter\", \"substitution\": \"Olive oil\"}]}\n```";
        let map = normalize(payload, &no_ids());
        assert_eq!(map["Butter"], "Olive oil");
    }

    #[test]
    fn test_normalize_skips_json_without_records() {
        // 最初の [1, 2] はレコードを含まないので次の候補へ
        let payload = r#"Scores [1, 2] then [{"original":"Tuna","substitution":"Chicken"}]"#;
        let map = normalize(payload, &no_ids());
        assert_eq!(map["Tuna"], "Chicken");
    }

    #[test]
    fn test_normalize_drops_incomplete_records() {
        let payload = r#"[{"original":"Milk"},{"substitution":"Oat milk"},{"original":"Cheese","substitution":"Vegan cheese"}]"#;
        let map = normalize(payload, &no_ids());
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("Cheese"));
    }

    #[test]
    fn test_normalize_flat_map() {
        let map = normalize(r#"{"Cheese":"Vegan cheese"}"#, &no_ids());
        assert_eq!(map["Cheese"], "Vegan cheese");
    }

    #[test]
    fn test_normalize_garbage_returns_empty() {
        assert!(normalize("not json at all {{{ [[[", &no_ids()).is_empty());
        assert!(normalize("", &no_ids()).is_empty());
        assert!(normalize("{\"meals\": 42}", &no_ids()).is_empty());
    }

    #[test]
    fn test_ingredient_table_ids() {
        let table = IngredientTable::from_texts(["Milk toast", "milk toast", " ", "Cheese sandwich"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("ing_1"), Some("Milk toast"));
        assert_eq!(table.lookup("ing_2"), Some("Cheese sandwich"));
        assert_eq!(table.lookup("ing_3"), None);
    }
}
