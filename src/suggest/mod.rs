//! 提案サービス（AI CLI連携とキャッシュ）

pub mod cache;
mod cli_service;

pub use cache::{cache_key, CachingService, SuggestionCache};
pub use cli_service::{backoff_delay, CliSuggestionService};
