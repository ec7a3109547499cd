//! シートをデータストアとして扱うゲートウェイ
//!
//! トランザクションのないリモートのシートに対して、読み込み・キー指定の更新・
//! 追記・消去を最小限のAPI呼び出しで行う。触れないセルは一切書き換えない。
//!
//! ## 1操作あたりの呼び出し順（並行させない）
//! - 更新: ヘッダー行取得 → （新しい列があれば）ヘッダー書き込み → 全体取得 → 行書き込み
//! - 追記: ヘッダー行取得 → （新しい列があれば）ヘッダー書き込み → 全体取得 → 空行へ書き込み or 末尾に追記
//! - 消去: 全体取得 → 行の消去

pub mod api;
pub mod google;
pub mod local;

pub use api::SheetsApi;
pub use google::GoogleSheetsClient;
pub use local::LocalWorkbook;

use crate::error::{Result, SheetError};
use futures::future::join_all;
use sheetdesk_common::store::{header_key, is_blank_row};
use sheetdesk_common::{Patch, SheetRange, TabularStore};

/// 読み込み結果（失敗してもストアは常に有効）
#[derive(Debug)]
pub struct LoadOutcome {
    pub store: TabularStore,
    pub error: Option<SheetError>,
}

/// キー指定更新の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// 書き込んだ行番号（1始まり）
    pub row_number: usize,
    /// 追加したヘッダー
    pub added_columns: Vec<String>,
}

/// 追記の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    pub row_number: usize,
    /// 空行を再利用したか（falseなら末尾に追記）
    pub reused_slot: bool,
    pub added_columns: Vec<String>,
}

/// キー指定消去の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared { row_number: usize },
    /// 該当行なし（削除済みとみなす）
    NotFound,
}

pub struct SheetGateway<A> {
    api: A,
}

impl<A: SheetsApi> SheetGateway<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// シート全体を読み込む
    ///
    /// 1行目がヘッダー（空シートならヘッダーなし）、完全な空行は除外する。
    pub async fn load(&self, sheet: &str) -> Result<TabularStore> {
        let values = self
            .api
            .get_values(&SheetRange::sheet(sheet))
            .await
            .map_err(|e| SheetError::load(sheet, e))?;
        let store = TabularStore::from_values(sheet, values);
        log::debug!("{}: {}列 {}行を読み込み", sheet, store.width(), store.len());
        Ok(store)
    }

    /// 読み込みに失敗しても空のストアを返す
    pub async fn load_or_empty(&self, sheet: &str) -> LoadOutcome {
        match self.load(sheet).await {
            Ok(store) => LoadOutcome { store, error: None },
            Err(e) => {
                log::warn!("{}", e);
                LoadOutcome {
                    store: TabularStore::empty(sheet),
                    error: Some(e),
                }
            }
        }
    }

    /// 互いに独立したシートを並行して読み込む（結果は引数の順）
    pub async fn load_many(&self, sheets: &[&str]) -> Vec<LoadOutcome> {
        join_all(sheets.iter().map(|sheet| self.load_or_empty(sheet))).await
    }

    /// キー列の値が一致する行のうち、パッチの列だけを書き換える
    ///
    /// 未知の列はヘッダー末尾に追加してから行を書き込む。
    /// キー列がなければ`MissingColumn`、行がなければ`RowNotFound`。
    pub async fn upsert_by_key(
        &self,
        sheet: &str,
        key_column: &str,
        key_value: &str,
        patch: &Patch,
    ) -> Result<UpsertOutcome> {
        let mut headers = self.fetch_headers(sheet).await?;
        let Some(key_index) = headers.iter().position(|h| h == key_column) else {
            return Err(SheetError::MissingColumn {
                sheet: sheet.to_string(),
                column: key_column.to_string(),
            });
        };

        let mut added_columns: Vec<String> = Vec::new();
        for column in patch.columns() {
            if column.trim().is_empty() {
                continue;
            }
            if !headers.iter().any(|h| h == column) && !added_columns.iter().any(|c| c == column) {
                added_columns.push(column.to_string());
            }
        }
        self.extend_headers(sheet, &mut headers, &added_columns).await?;

        let values = self.api.get_values(&SheetRange::sheet(sheet)).await?;
        let Some(position) = values
            .iter()
            .skip(1)
            .position(|row| row.get(key_index).map(String::as_str) == Some(key_value))
        else {
            return Err(SheetError::RowNotFound {
                sheet: sheet.to_string(),
                column: key_column.to_string(),
                value: key_value.to_string(),
            });
        };
        let row_number = position + 2;

        let mut row = values[position + 1].clone();
        if row.len() < headers.len() {
            row.resize(headers.len(), String::new());
        }
        for (column, value) in patch.iter() {
            if let Some(index) = headers.iter().position(|h| h == column) {
                row[index] = value.to_string();
            }
        }

        let width = row.len();
        self.api
            .update_values(&SheetRange::row(sheet, row_number, width), vec![row])
            .await?;

        Ok(UpsertOutcome {
            row_number,
            added_columns,
        })
    }

    /// レコードを追記する
    ///
    /// 列名は大文字小文字・前後空白を無視して照合する。
    /// 完全な空行（削除跡）があれば最初の空行に書き込み、なければ末尾に追記する。
    pub async fn append(&self, sheet: &str, record: &Patch) -> Result<AppendOutcome> {
        let mut headers = self.fetch_headers(sheet).await?;

        let mut added_columns: Vec<String> = Vec::new();
        for column in record.columns() {
            let key = header_key(column);
            if key.is_empty() {
                continue;
            }
            let known = headers.iter().any(|h| header_key(h) == key)
                || added_columns.iter().any(|c| header_key(c) == key);
            if !known {
                added_columns.push(column.trim().to_string());
            }
        }
        self.extend_headers(sheet, &mut headers, &added_columns).await?;

        let mut row = vec![String::new(); headers.len()];
        for (column, value) in record.iter() {
            let key = header_key(column);
            if let Some(index) = headers.iter().position(|h| header_key(h) == key) {
                row[index] = value.to_string();
            }
        }

        let values = self.api.get_values(&SheetRange::sheet(sheet)).await?;
        let slot = values.iter().skip(1).position(|r| is_blank_row(r));

        let (row_number, reused_slot) = match slot {
            Some(position) => {
                let row_number = position + 2;
                log::info!("{}: 空行{}を再利用して追記", sheet, row_number);
                let width = row.len();
                self.api
                    .update_values(&SheetRange::row(sheet, row_number, width), vec![row])
                    .await?;
                (row_number, true)
            }
            None => {
                let row_number = values.len().max(1) + 1;
                self.api
                    .append_values(&SheetRange::sheet(sheet), vec![row])
                    .await?;
                (row_number, false)
            }
        };

        Ok(AppendOutcome {
            row_number,
            reused_slot,
            added_columns,
        })
    }

    /// キー列の値が一致する行の全セルを消去する（行自体は残る）
    ///
    /// 該当行がなくてもエラーにしない（再試行された削除を成功させる）。
    pub async fn clear_by_key(&self, sheet: &str, key_column: &str, key_value: &str) -> Result<ClearOutcome> {
        let values = self.api.get_values(&SheetRange::sheet(sheet)).await?;
        let headers = values.first().cloned().unwrap_or_default();
        let Some(key_index) = headers.iter().position(|h| h == key_column) else {
            return Err(SheetError::MissingColumn {
                sheet: sheet.to_string(),
                column: key_column.to_string(),
            });
        };

        let found = values
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| row.get(key_index).map(String::as_str) == Some(key_value));

        let Some((index, row)) = found else {
            log::warn!("{}: {}={}の行がないため消去をスキップ", sheet, key_column, key_value);
            return Ok(ClearOutcome::NotFound);
        };

        let row_number = index + 1;
        let width = headers.len().max(row.len());
        self.api
            .clear_values(&SheetRange::row(sheet, row_number, width))
            .await?;
        Ok(ClearOutcome::Cleared { row_number })
    }

    async fn fetch_headers(&self, sheet: &str) -> Result<Vec<String>> {
        let values = self.api.get_values(&SheetRange::header_row(sheet)).await?;
        Ok(values.into_iter().next().unwrap_or_default())
    }

    /// 新しい列をヘッダー末尾に1回の書き込みで追加する
    async fn extend_headers(&self, sheet: &str, headers: &mut Vec<String>, added: &[String]) -> Result<()> {
        if added.is_empty() {
            return Ok(());
        }

        log::info!("{}: 列を追加 {:?}", sheet, added);
        let anchor = SheetRange::cell(sheet, headers.len() + 1, 1);
        self.api.update_values(&anchor, vec![added.to_vec()]).await?;
        headers.extend(added.iter().cloned());
        Ok(())
    }
}
