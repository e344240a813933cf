use crate::ai_provider::AiProvider;
use crate::error::{MenuAllergenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ai_provider: AiProvider,
    /// 空ならプロバイダ既定のモデル
    pub model: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    /// `--allergens` 未指定時のアレルゲン
    pub default_allergens: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai_provider: AiProvider::Claude,
            model: String::new(),
            timeout_seconds: 180,
            max_retries: 3,
            retry_delay_seconds: 2,
            default_allergens: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `~/.config/menu-allergen`
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| MenuAllergenError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("menu-allergen"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// モデル指定（空なら None）
    pub fn model(&self) -> Option<&str> {
        Some(self.model.as_str()).filter(|m| !m.trim().is_empty())
    }
}
