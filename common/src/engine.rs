//! 置換エンジン
//!
//! セルテキストにルールセットを適用し、置換後テキストと置換履歴を返す。
//!
//! ## 処理
//! 1. ルールごとに大文字小文字を無視して出現箇所を探す（入力テキスト上の区間）
//! 2. 既に確保された区間と重なる出現はスキップ
//! 3. 全ルールを走査した後、区間リストから出力テキストを1回で組み立てる
//!
//! 置換後の文字列は走査対象にならないため、あるルールの置換結果が
//! 別のルールに再マッチすることはない。

use crate::rules::{CompiledRule, RuleSet, RuleSource};
use crate::tokenizer::ParsedCell;
use crate::types::SlotLabel;
use serde::Serialize;
use std::ops::Range;
use tracing::debug;

/// 乳製品を含まないミルク（"milk" ルールの重複適用ガード用）
pub const DAIRY_FREE_MILKS: &[&str] = &[
    "soy milk",
    "almond milk",
    "oat milk",
    "rice milk",
    "coconut milk",
];

/// 適用された置換1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    /// 原文にそのまま現れた文字列
    pub matched: String,
    pub replacement: String,
    pub slot: SlotLabel,
    pub source: RuleSource,
    /// 入力テキスト上の区間（バイト位置）
    pub source_span: Range<usize>,
    /// 出力テキスト上の区間（バイト位置）
    pub output_span: Range<usize>,
}

/// 1セル分の適用結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub text: String,
    /// 出力テキスト上の位置順
    pub substitutions: Vec<Substitution>,
}

impl Applied {
    pub fn is_changed(&self) -> bool {
        !self.substitutions.is_empty()
    }
}

/// セルテキストにルールセットを適用する
///
/// 食事区分はマッチ位置を含むマーカー区間から決める。
/// どの区間にも属さない位置は `SlotLabel::Unassigned`。
pub fn apply(text: &str, rules: &RuleSet) -> Applied {
    let cell = ParsedCell::scan(text);
    apply_parsed(&cell, rules)
}

/// パース済みセルにルールセットを適用する
pub fn apply_parsed(cell: &ParsedCell, rules: &RuleSet) -> Applied {
    let text = cell.raw();
    let mut claimed: Vec<(Range<usize>, &CompiledRule)> = Vec::new();

    for compiled in rules.iter() {
        if milk_already_substituted(compiled, text) {
            debug!("'{}' は代替ミルク済みのためスキップ", compiled.rule.original);
            continue;
        }

        for m in compiled.pattern.find_iter(text) {
            let span = m.range();
            let overlaps = claimed
                .iter()
                .any(|(c, _)| c.start < span.end && span.start < c.end);
            if !overlaps {
                claimed.push((span, compiled));
            }
        }
    }

    claimed.sort_by_key(|(span, _)| span.start);

    let mut output = String::with_capacity(text.len());
    let mut substitutions = Vec::with_capacity(claimed.len());
    let mut cursor = 0;

    for (span, compiled) in claimed {
        output.push_str(&text[cursor..span.start]);
        let out_start = output.len();
        output.push_str(&compiled.rule.replacement);

        substitutions.push(Substitution {
            matched: text[span.clone()].to_string(),
            replacement: compiled.rule.replacement.clone(),
            slot: cell.slot_at(span.start),
            source: compiled.rule.source,
            output_span: out_start..output.len(),
            source_span: span.clone(),
        });
        cursor = span.end;
    }
    output.push_str(&text[cursor..]);

    Applied {
        text: output,
        substitutions,
    }
}

/// 原文がちょうど "milk" のルールで、既に代替ミルクが入っているテキストか
///
/// "Milk → Soy milk" を再適用して "Soy Soy milk" になるのを防ぐ限定的なガード。
/// 他のルールへの一般化はしない。
fn milk_already_substituted(compiled: &CompiledRule, text: &str) -> bool {
    if !compiled.rule.original.trim().eq_ignore_ascii_case("milk") {
        return false;
    }
    let lower = text.to_lowercase();
    DAIRY_FREE_MILKS.iter().any(|m| lower.contains(m))
}
