//! リソース単位の汎用CRUD
//!
//! `ResourceConfig`（シート名・キー列・ID接頭辞・項目・JSON列）だけを受け取り、
//! 一覧・取得・作成・更新・削除とセル内JSON列の読み書きを行う。
//! 書き込みが確定した後にだけローカルのスナップショットへ反映する。
//! 定義は組み込みのほか、`--resource`で渡したJSONファイルからも読める。

use crate::error::{Result, SheetError};
use crate::gateway::{AppendOutcome, ClearOutcome, SheetGateway, SheetsApi, UpsertOutcome};
use sheetdesk_common::store::header_key;
use sheetdesk_common::{
    decode, encode, project, Decoded, EmbeddedShape, Patch, Projection, Record, ResourceConfig,
    TabularStore, ViewState,
};
use std::path::Path;

/// シート名に対応するリソース定義（`--resource`のJSON → 組み込み定義の順）
///
/// JSONのシート名が一致しなければ組み込み定義を探す。
pub fn resource_config(sheet: &str, path: Option<&Path>) -> Result<Option<ResourceConfig>> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)?;
        let config = ResourceConfig::from_json(&content)?;
        if config.sheet.trim().eq_ignore_ascii_case(sheet.trim()) {
            return Ok(Some(config));
        }
    }
    Ok(ResourceConfig::builtin(sheet))
}

pub struct ResourceManager<'g, A> {
    gateway: &'g SheetGateway<A>,
    config: ResourceConfig,
    store: TabularStore,
}

impl<'g, A: SheetsApi> ResourceManager<'g, A> {
    pub fn new(gateway: &'g SheetGateway<A>, config: ResourceConfig) -> Self {
        let store = TabularStore::empty(config.sheet.clone());
        Self {
            gateway,
            config,
            store,
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn store(&self) -> &TabularStore {
        &self.store
    }

    /// シートを読み直す（失敗時は前のスナップショットを保持）
    pub async fn refresh(&mut self) -> Result<()> {
        self.store = self.gateway.load(&self.config.sheet).await?;
        Ok(())
    }

    pub fn list(&self, view: &ViewState) -> Projection {
        project(&self.store, view)
    }

    pub fn get(&self, id: &str) -> Option<Record<'_>> {
        self.store.find_by_key(&self.config.key_column, id)
    }

    /// 新規レコードを追記し、採番したIDを返す
    ///
    /// 列はキー列 → 設定の項目順 → それ以外の入力の順に並べ、未入力の項目は空で書く
    /// （空のシートでも設定順のヘッダーができる）。列名は大文字小文字を無視して照合し、
    /// キー列への入力は採番したIDで置き換える。ステータス列が未入力なら既定値を入れる。
    pub async fn create(&mut self, fields: Patch) -> Result<(String, AppendOutcome)> {
        let id = self.next_id(chrono::Utc::now().timestamp_millis());
        let key = header_key(&self.config.key_column);
        let lookup = |column: &str| {
            let wanted = header_key(column);
            fields
                .iter()
                .filter(|(c, _)| header_key(c) == wanted)
                .last()
                .map(|(_, v)| v.to_string())
        };

        let mut record = Patch::new().with(self.config.key_column.clone(), id.clone());
        for field in &self.config.fields {
            if header_key(field) != key {
                record.set(field.clone(), lookup(field).unwrap_or_default());
            }
        }
        for (column, value) in fields.iter() {
            let column_key = header_key(column);
            if column_key.is_empty() || column_key == key {
                continue;
            }
            if !record.columns().any(|c| header_key(c) == column_key) {
                record.set(column, value);
            }
        }

        if let Some(status) = &self.config.status_column {
            let current = record
                .iter()
                .find(|(c, _)| header_key(c) == header_key(status))
                .map(|(c, v)| (c.to_string(), v.trim().is_empty()));
            if !self.config.default_status.is_empty() {
                match current {
                    Some((column, true)) => record.set(column, self.config.default_status.clone()),
                    None => record.set(status.clone(), self.config.default_status.clone()),
                    Some((_, false)) => {}
                }
            }
        }

        let outcome = self.gateway.append(&self.config.sheet, &record).await?;
        self.store.insert_record(outcome.row_number, &record);
        log::info!("{}: {}を作成 (行{})", self.config.sheet, id, outcome.row_number);
        Ok((id, outcome))
    }

    pub async fn update(&mut self, id: &str, patch: &Patch) -> Result<UpsertOutcome> {
        let outcome = self
            .gateway
            .upsert_by_key(&self.config.sheet, &self.config.key_column, id, patch)
            .await?;
        self.store.apply_patch(&self.config.key_column, id, patch);
        Ok(outcome)
    }

    pub async fn delete(&mut self, id: &str) -> Result<ClearOutcome> {
        let outcome = self
            .gateway
            .clear_by_key(&self.config.sheet, &self.config.key_column, id)
            .await?;
        self.store.remove_by_key(&self.config.key_column, id);
        Ok(outcome)
    }

    /// セル内JSON列を型付きで読む（壊れたセルは空＋診断）
    ///
    /// 列は設定でJSON列として定義され、形（配列/オブジェクト）が一致している必要がある。
    pub fn read_collection<T: EmbeddedShape>(&self, id: &str, column: &str) -> Result<Decoded<T>> {
        self.check_collection::<T>(column)?;
        let record = self.get(id).ok_or_else(|| self.row_not_found(id))?;
        Ok(decode::<T>(record.value(column)))
    }

    /// セル内JSON列を丸ごと書き戻す
    pub async fn write_collection<T: EmbeddedShape>(
        &mut self,
        id: &str,
        column: &str,
        value: &T,
    ) -> Result<UpsertOutcome> {
        self.check_collection::<T>(column)?;
        let patch = Patch::new().with(column, encode(value));
        self.update(id, &patch).await
    }

    /// `接頭辞-ミリ秒` のID。既存IDと重ならないよう繰り上げる
    pub fn next_id(&self, now_millis: i64) -> String {
        let prefix = format!("{}-", self.config.id_prefix);
        let newest = self
            .store
            .records()
            .filter_map(|r| r.value(&self.config.key_column).strip_prefix(&prefix)?.parse::<i64>().ok())
            .max();

        let number = match newest {
            Some(n) if n >= now_millis => n.checked_add(1).unwrap_or(now_millis),
            _ => now_millis,
        };
        format!("{}{}", prefix, number)
    }

    fn check_collection<T: EmbeddedShape>(&self, column: &str) -> Result<()> {
        let Some(kind) = self.config.collection_kind(column) else {
            return Err(SheetError::Config(format!(
                "{}の列「{}」はJSON列として定義されていません",
                self.config.sheet, column
            )));
        };
        if kind.hint() != T::HINT {
            return Err(SheetError::Config(format!(
                "{}の列「{}」は{:?}ですが{}として読み書きしようとしました",
                self.config.sheet,
                column,
                kind,
                T::NAME
            )));
        }
        Ok(())
    }

    fn row_not_found(&self, id: &str) -> SheetError {
        SheetError::RowNotFound {
            sheet: self.config.sheet.clone(),
            column: self.config.key_column.clone(),
            value: id.to_string(),
        }
    }
}
