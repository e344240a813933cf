//! menu-allergen-rust
//!
//! 週間献立表のアレルゲン変換ツール（CLI側）。
//! 変換ロジックは menu_allergen_common、このクレートは
//! ファイル入出力・AI CLI連携・設定・ルール保存を受け持つ。

pub mod ai_provider;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod rule_store;
pub mod suggest;
pub mod table_io;
