//! リモートのシートAPI境界

use crate::error::Result;
use async_trait::async_trait;
use sheetdesk_common::SheetRange;
use std::sync::Arc;

/// 値の読み書きだけを行う最小限のシートAPI
///
/// 行・セルは文字列。範囲の解釈（末尾の空行・空セルを返さない、
/// 追記は最後の非空行の次）はGoogle Sheets API v4に合わせる。
#[async_trait]
pub trait SheetsApi: Send + Sync {
    async fn get_values(&self, range: &SheetRange) -> Result<Vec<Vec<String>>>;

    async fn update_values(&self, range: &SheetRange, rows: Vec<Vec<String>>) -> Result<()>;

    async fn append_values(&self, range: &SheetRange, rows: Vec<Vec<String>>) -> Result<()>;

    async fn clear_values(&self, range: &SheetRange) -> Result<()>;
}

#[async_trait]
impl<T: SheetsApi + ?Sized> SheetsApi for Arc<T> {
    async fn get_values(&self, range: &SheetRange) -> Result<Vec<Vec<String>>> {
        (**self).get_values(range).await
    }

    async fn update_values(&self, range: &SheetRange, rows: Vec<Vec<String>>) -> Result<()> {
        (**self).update_values(range, rows).await
    }

    async fn append_values(&self, range: &SheetRange, rows: Vec<Vec<String>>) -> Result<()> {
        (**self).append_values(range, rows).await
    }

    async fn clear_values(&self, range: &SheetRange) -> Result<()> {
        (**self).clear_values(range).await
    }
}
