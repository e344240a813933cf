//! 提案結果キャッシュモジュール
//!
//! 実行フィンガープリント（表・アレルゲン・カスタムルール）と
//! 問い合わせ先（プロバイダ・モデル）をキーにして提案サービスの生の応答を保存し、
//! 同じ条件での再問い合わせをスキップする。

use crate::ai_provider::AiProvider;
use crate::error::Result;
use chrono::{DateTime, Utc};
use menu_allergen_common::{normalize, SuggestionRequest, SuggestionService};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CACHE_FILE_NAME: &str = ".suggestion-cache.json";

/// キャッシュキー（`<provider>/<model>/<fingerprint>`）
pub fn cache_key(fingerprint: &str, provider: AiProvider, model: Option<&str>) -> String {
    let model = model.filter(|m| !m.is_empty()).unwrap_or("default");
    format!("{}/{}/{}", provider.command_name(), model, fingerprint)
}

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionCache {
    /// バージョン（互換性チェック用）
    version: u32,
    /// キャッシュキー → 応答
    entries: HashMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 提案サービスの生の応答
    pub payload: String,
    /// 問い合わせた食材数
    pub ingredient_count: usize,
    pub created_at: DateTime<Utc>,
}

impl SuggestionCache {
    const CURRENT_VERSION: u32 = 2;

    /// キャッシュファイルのパス
    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを読み込み（壊れていれば空）
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        match serde_json::from_reader::<_, SuggestionCache>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(_) => {
                warn!("キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(e) => {
                warn!("キャッシュを読み込めません ({}), 再生成します", e);
                Self::default()
            }
        }
    }

    /// キャッシュファイルを保存
    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::cache_path(folder))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在しなければ false）
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if cache_path.exists() {
            std::fs::remove_file(cache_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, payload: String, ingredient_count: usize) {
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                ingredient_count,
                created_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SuggestionCache {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// キャッシュ付き提案サービス
///
/// ヒットすれば内側のサービスを呼ばずに保存済みの応答を返す。
/// ミスした場合は内側の応答を記録する。失敗と、提案を1件も取り出せない
/// 応答（謝罪文やレート制限メッセージなど）は記録しない。
pub struct CachingService<'a> {
    inner: &'a dyn SuggestionService,
    key: String,
    cache: RefCell<SuggestionCache>,
    hit: Cell<bool>,
}

impl<'a> CachingService<'a> {
    pub fn new(inner: &'a dyn SuggestionService, cache: SuggestionCache, key: String) -> Self {
        Self {
            inner,
            key,
            cache: RefCell::new(cache),
            hit: Cell::new(false),
        }
    }

    /// 直前のリクエストがキャッシュから返されたか
    pub fn was_hit(&self) -> bool {
        self.hit.get()
    }

    pub fn into_cache(self) -> SuggestionCache {
        self.cache.into_inner()
    }
}

impl SuggestionService for CachingService<'_> {
    fn request_suggestions(
        &self,
        request: &SuggestionRequest,
        progress: &mut dyn FnMut(&str),
    ) -> menu_allergen_common::Result<String> {
        if let Some(entry) = self.cache.borrow().get(&self.key) {
            debug!("キャッシュヒット: {}", self.key);
            self.hit.set(true);
            return Ok(entry.payload.clone());
        }

        self.hit.set(false);
        let payload = self.inner.request_suggestions(request, progress)?;
        if normalize(&payload, &request.ingredients).is_empty() {
            warn!("提案を取り出せない応答のためキャッシュしません");
            return Ok(payload);
        }
        self.cache.borrow_mut().insert(
            self.key.clone(),
            payload.clone(),
            request.ingredients.len(),
        );
        Ok(payload)
    }
}
