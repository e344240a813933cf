use thiserror::Error;

#[derive(Error, Debug)]
pub enum MenuAllergenError {
    #[error(transparent)]
    Common(#[from] menu_allergen_common::Error),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("未対応のファイル形式です: {0}（xlsx/xlsm/xls/ods/csv に対応）")]
    UnsupportedFormat(String),

    #[error("表の読み込みに失敗: {0}")]
    TableRead(String),

    #[error("表の書き出しに失敗: {0}")]
    TableWrite(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("ルールが見つかりません: id={0}")]
    RuleNotFound(u64),

    #[error("CLI実行エラー: {0}")]
    CliExecution(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MenuAllergenError>;
