//! カスタム置換ルールの保存先
//!
//! `~/.config/menu-allergen/rules.json` に JSON で保存する。
//! IDは削除後も再利用しない。置換元ごとにルールは1件。

use crate::config::Config;
use crate::error::{MenuAllergenError, Result};
use chrono::{DateTime, Utc};
use menu_allergen_common::SubstitutionRule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RULES_FILE_NAME: &str = "rules.json";

/// 保存済みルール
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRule {
    pub id: u64,
    pub allergen: String,
    pub original: String,
    pub replacement: String,
    pub created_at: DateTime<Utc>,
}

impl StoredRule {
    /// エンジンに渡すカスタムルール
    pub fn to_rule(&self) -> SubstitutionRule {
        SubstitutionRule::custom(&self.original, &self.replacement).with_allergen(&self.allergen)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RulesFile {
    next_id: u64,
    rules: Vec<StoredRule>,
}

impl Default for RulesFile {
    fn default() -> Self {
        Self {
            next_id: 1,
            rules: Vec::new(),
        }
    }
}

/// JSONファイルのルールストア
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    data: RulesFile,
}

impl RuleStore {
    /// 既定の保存先
    pub fn default_path() -> Result<PathBuf> {
        Ok(Config::config_dir()?.join(RULES_FILE_NAME))
    }

    /// ストアを開く（ファイルがなければ空）
    pub fn open(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            debug!("ルールファイルなし: {}", path.display());
            RulesFile::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ルールを追加して保存する
    ///
    /// 同じ置換元（大文字小文字無視）のルールがあれば、IDを保ったまま上書きする
    pub fn create(&mut self, allergen: &str, original: &str, replacement: &str) -> Result<StoredRule> {
        let (allergen, original, replacement) = (allergen.trim(), original.trim(), replacement.trim());
        if original.is_empty() || replacement.is_empty() {
            return Err(MenuAllergenError::Config(
                "置換元と置換先は空にできません".into(),
            ));
        }
        if let Some(pos) = self
            .data
            .rules
            .iter()
            .position(|r| r.original.eq_ignore_ascii_case(original))
        {
            let existing = &mut self.data.rules[pos];
            info!(
                "'{}' の既存ルール (id={}) を更新: '{}' → '{}'",
                original, existing.id, existing.replacement, replacement
            );
            existing.allergen = allergen.to_string();
            existing.original = original.to_string();
            existing.replacement = replacement.to_string();
            let updated = existing.clone();
            self.save()?;
            return Ok(updated);
        }

        let rule = StoredRule {
            id: self.data.next_id,
            allergen: allergen.to_string(),
            original: original.to_string(),
            replacement: replacement.to_string(),
            created_at: Utc::now(),
        };
        self.data.next_id += 1;
        self.data.rules.push(rule.clone());
        self.save()?;
        Ok(rule)
    }

    /// 作成順の一覧
    pub fn list(&self) -> &[StoredRule] {
        &self.data.rules
    }

    /// IDで削除して保存する
    pub fn delete(&mut self, id: u64) -> Result<StoredRule> {
        let pos = self
            .data
            .rules
            .iter()
            .position(|r| r.id == id)
            .ok_or(MenuAllergenError::RuleNotFound(id))?;
        let removed = self.data.rules.remove(pos);
        self.save()?;
        Ok(removed)
    }

    /// エンジンに渡すカスタムルール（作成順）
    pub fn custom_rules(&self) -> Vec<SubstitutionRule> {
        self.data.rules.iter().map(StoredRule::to_rule).collect()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
