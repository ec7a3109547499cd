//! Sheetdesk
//!
//! Google Sheetsのシートをデータベースとして扱うデータアクセス層
//!
//! - `gateway`: 読み込み・キー指定更新・追記・消去（リモートAPI境界）
//! - `resource`: リソース定義に基づく汎用CRUD
//! - `dashboard`: タブごとのスナップショットと操作状況
//! - `config`: 設定ファイルと認証情報

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod resource;

pub use dashboard::{ActionStatus, Dashboard, TabState};
pub use error::{ErrorKind, Result, SheetError};
pub use gateway::{
    AppendOutcome, ClearOutcome, GoogleSheetsClient, LoadOutcome, LocalWorkbook, SheetGateway,
    SheetsApi, UpsertOutcome,
};
pub use resource::ResourceManager;
