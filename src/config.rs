use crate::error::{Result, SheetError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";

const TOKEN_ENV: &str = "SHEETDESK_ACCESS_TOKEN";
const SPREADSHEET_ENV: &str = "SHEETDESK_SPREADSHEET_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spreadsheet_id: Option<String>,
    pub access_token: Option<String>,
    pub api_base_url: String,
    pub timeout_seconds: u64,
    /// RAW / USER_ENTERED
    pub value_input_option: String,
    /// 設定するとリモートAPIの代わりにローカルのJSONワークブックを使う
    pub local_workbook: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            access_token: None,
            api_base_url: DEFAULT_API_BASE_URL.into(),
            timeout_seconds: 30,
            value_input_option: "USER_ENTERED".into(),
            local_workbook: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        if config.timeout_seconds == 0 {
            return Err(SheetError::Config("timeout_seconds must be positive".into()));
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| SheetError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("sheetdesk").join("config.json"))
    }

    pub fn access_token(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }

        self.access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(SheetError::MissingCredential)
    }

    pub fn spreadsheet_id(&self) -> Result<String> {
        if let Ok(id) = std::env::var(SPREADSHEET_ENV) {
            if !id.trim().is_empty() {
                return Ok(id);
            }
        }

        self.spreadsheet_id.clone().filter(|id| !id.trim().is_empty()).ok_or_else(|| {
            SheetError::Config(
                "スプレッドシートIDが設定されていません。`sheetdesk config --set-spreadsheet ID` で設定してください".into(),
            )
        })
    }

    pub fn set_access_token(&mut self, token: String) -> Result<()> {
        self.access_token = Some(token);
        self.save()
    }

    pub fn set_spreadsheet_id(&mut self, id: String) -> Result<()> {
        self.spreadsheet_id = Some(id);
        self.save()
    }

    pub fn set_local_workbook(&mut self, path: PathBuf) -> Result<()> {
        self.local_workbook = Some(path);
        self.save()
    }
}
