//! Sheetdesk Common Library
//!
//! シートをデータストアとして扱うための共通ロジック（I/Oなし）
//!
//! - `store`: シートのスナップショットと列解決
//! - `range`: A1形式のレンジ表記
//! - `codec`: セル内JSONコレクションの変換
//! - `projection`: 検索・絞り込み・並べ替え・グループ化
//! - `schema`: リソース（シート）定義
//! - `analytics`: ステータス別件数・費用合計

pub mod analytics;
pub mod codec;
pub mod error;
pub mod projection;
pub mod range;
pub mod schema;
pub mod store;

pub use analytics::{summarize, Summary};
pub use codec::{decode, decode_value, encode, DecodeError, Decoded, EmbeddedShape, ShapeHint};
pub use error::{Error, Result};
pub use projection::{
    project, ColumnFilter, Projection, SortDirection, SortKind, SortSpec, ViewMode, ViewState,
};
pub use range::{column_index, column_letter, SheetRange};
pub use schema::{CollectionKind, ResourceConfig};
pub use store::{Patch, Record, RecordObject, TabularStore};
