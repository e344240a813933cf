//! 変換実行のフィンガープリント
//!
//! (表, アレルゲン選択, ルールセット) から決定的なSHA-256ハッシュを作る。
//! 呼び出し側のキャッシュが有効かどうかの判定に使う。

use crate::rules::SubstitutionRule;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Serialize)]
struct FingerprintInput<'a> {
    version: u32,
    table: &'a [Vec<String>],
    allergens: Vec<String>,
    rules: Vec<(String, String)>,
}

/// フィンガープリント（16進数64文字）
///
/// アレルゲンは大文字小文字と順序を無視、ルールは原文の小文字順で正規化する
pub fn fingerprint(
    table: &[Vec<String>],
    allergens: &[String],
    rules: &[SubstitutionRule],
) -> String {
    let mut allergens: Vec<String> = allergens.iter().map(|a| a.trim().to_lowercase()).collect();
    allergens.sort();
    allergens.dedup();

    let mut rules: Vec<(String, String)> = rules
        .iter()
        .map(|r| (r.original.trim().to_lowercase(), r.replacement.clone()))
        .collect();
    rules.sort();

    let input = FingerprintInput {
        version: 1,
        table,
        allergens,
        rules,
    };

    // Vec/String/tuple のみなのでシリアライズは失敗しない
    let bytes = serde_json::to_vec(&input).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}
