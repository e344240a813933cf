use clap::{Parser, Subcommand};
use crate::ai_provider::AiProvider;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "menu-allergen")]
#[command(about = "週間献立表のアレルゲン変換ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// AIプロバイダ (claude/codex/gemini)。省略時は設定ファイルの値
    #[arg(long, global = true)]
    pub ai_provider: Option<AiProvider>,

    /// カスタムルールファイル（デフォルト: ~/.config/menu-allergen/rules.json）
    #[arg(long, global = true)]
    pub rules_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 献立表を変換してファイルに出力
    Convert {
        /// 献立表ファイル (xlsx/xlsm/xls/ods/csv)
        #[arg(required = true)]
        input: PathBuf,

        /// 出力ファイル（デフォルト: <入力名>_converted.xlsx）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 除去するアレルゲン（カンマ区切り）。省略時は設定ファイルの値
        #[arg(short, long, value_delimiter = ',')]
        allergens: Vec<String>,

        /// AIに問い合わせず、カスタムルールだけで変換
        #[arg(long)]
        no_ai: bool,

        /// キャッシュを使用（同じ条件での再問い合わせをスキップ）
        #[arg(long)]
        use_cache: bool,

        /// 選択アレルゲンの組み込みルールもカスタムルールとして使う
        #[arg(long)]
        with_presets: bool,

        /// 変更ログとサマリをJSONで出力
        #[arg(long)]
        report: Option<PathBuf>,

        /// 出力形式 (excel/csv)。省略時は出力ファイルの拡張子から判定
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },

    /// 献立表の構造だけを確認（変換しない）
    Inspect {
        /// 献立表ファイル
        #[arg(required = true)]
        input: PathBuf,
    },

    /// カスタムルール管理
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// 設定を表示/編集
    Config {
        /// モデルを設定
        #[arg(long)]
        set_model: Option<String>,

        /// 既定のAIプロバイダを設定
        #[arg(long)]
        set_provider: Option<AiProvider>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// ルールを追加（省略した項目は対話入力）
    Add {
        /// アレルゲン
        #[arg(short, long)]
        allergen: Option<String>,

        /// 置換元
        #[arg(long)]
        original: Option<String>,

        /// 置換先
        #[arg(long)]
        replacement: Option<String>,
    },

    /// ルール一覧
    List,

    /// ルールを削除
    Delete {
        /// ルールID
        id: u64,
    },

    /// 組み込みルールを表示
    Presets {
        /// アレルゲン（省略時はすべて）
        allergen: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Excel,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "excel" | "xlsx" => Ok(OutputFormat::Excel),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use excel or csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Excel => write!(f, "excel"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
