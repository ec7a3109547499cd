use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("通信エラー{}: {message}", status_suffix(.status))]
    Transport { message: String, status: Option<u16> },

    #[error("シート「{sheet}」の読み込みに失敗: {source}")]
    Load {
        sheet: String,
        #[source]
        source: Box<SheetError>,
    },

    #[error("シート「{sheet}」に列「{column}」がありません")]
    MissingColumn { sheet: String, column: String },

    #[error("シート「{sheet}」に{column}={value}の行がありません")]
    RowNotFound {
        sheet: String,
        column: String,
        value: String,
    },

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("アクセストークンが設定されていません。`sheetdesk config --set-token TOKEN` または SHEETDESK_ACCESS_TOKEN で設定してください")]
    MissingCredential,

    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] sheetdesk_common::Error),
}

/// UI層に渡すエラー種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LoadError,
    MissingColumnError,
    RowNotFoundError,
    TransportError,
    ConfigError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::LoadError => "LoadError",
            ErrorKind::MissingColumnError => "MissingColumnError",
            ErrorKind::RowNotFoundError => "RowNotFoundError",
            ErrorKind::TransportError => "TransportError",
            ErrorKind::ConfigError => "ConfigError",
        };
        f.write_str(name)
    }
}

impl SheetError {
    pub fn transport(message: impl Into<String>) -> Self {
        SheetError::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// 読み込み失敗をシート名付きで包む（既に包まれていればそのまま）
    pub fn load(sheet: &str, error: SheetError) -> Self {
        match error {
            SheetError::Load { .. } => error,
            other => SheetError::Load {
                sheet: sheet.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SheetError::Load { .. } => ErrorKind::LoadError,
            SheetError::MissingColumn { .. } => ErrorKind::MissingColumnError,
            SheetError::RowNotFound { .. } => ErrorKind::RowNotFoundError,
            SheetError::Transport { .. } | SheetError::Io(_) | SheetError::Json(_) => {
                ErrorKind::TransportError
            }
            SheetError::Config(_) | SheetError::MissingCredential | SheetError::Common(_) => {
                ErrorKind::ConfigError
            }
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, SheetError>;
