//! ダッシュボードの状態
//!
//! タブごとにスナップショット・表示状態・射影結果・操作状況を持つ。
//! スナップショットを丸ごと置き換えるのは読み込み成功時だけで、
//! 書き込み成功時はパッチした列だけをローカルに反映する。

use crate::error::{ErrorKind, Result, SheetError};
use crate::gateway::{ClearOutcome, SheetGateway, SheetsApi, UpsertOutcome};
use sheetdesk_common::{project, Patch, Projection, TabularStore, ViewState};
use std::future::Future;

/// リモート操作の状況
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionStatus {
    #[default]
    Idle,
    Pending(String),
    Success(String),
    Error {
        label: String,
        kind: ErrorKind,
        message: String,
    },
}

impl ActionStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, ActionStatus::Pending(_))
    }
}

#[derive(Debug, Clone)]
pub struct TabState {
    pub name: String,
    pub store: TabularStore,
    pub view: ViewState,
    pub projection: Projection,
    pub status: ActionStatus,
}

impl TabState {
    fn new(name: &str, view: ViewState) -> Self {
        let store = TabularStore::empty(name);
        let projection = project(&store, &view);
        Self {
            name: name.to_string(),
            store,
            view,
            projection,
            status: ActionStatus::Idle,
        }
    }

    fn reproject(&mut self) {
        self.projection = project(&self.store, &self.view);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    tabs: Vec<TabState>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// タブを追加（同名のタブがあれば表示状態だけ差し替える）
    pub fn add_tab(&mut self, name: &str, view: ViewState) {
        match self.tab_mut(name) {
            Some(tab) => {
                tab.view = view;
                tab.reproject();
            }
            None => self.tabs.push(TabState::new(name, view)),
        }
    }

    pub fn tab(&self, name: &str) -> Option<&TabState> {
        self.tabs.iter().find(|t| t.name == name)
    }

    pub fn tab_names(&self) -> Vec<&str> {
        self.tabs.iter().map(|t| t.name.as_str()).collect()
    }

    fn tab_mut(&mut self, name: &str) -> Option<&mut TabState> {
        self.tabs.iter_mut().find(|t| t.name == name)
    }

    /// 読み込み結果でスナップショットを置き換える
    pub fn replace_snapshot(&mut self, tab: &str, store: TabularStore) -> bool {
        let Some(state) = self.tab_mut(tab) else {
            return false;
        };
        state.store = store;
        state.reproject();
        true
    }

    /// 表示状態を変更して射影を作り直す
    pub fn update<F>(&mut self, tab: &str, f: F) -> Option<&Projection>
    where
        F: FnOnce(&mut ViewState),
    {
        let state = self.tab_mut(tab)?;
        f(&mut state.view);
        state.reproject();
        Some(&state.projection)
    }

    /// 確定した書き込みを、同じキーで探し直した行のパッチ列にだけ反映する
    pub fn apply_confirmed_patch(&mut self, tab: &str, key_column: &str, key: &str, patch: &Patch) -> bool {
        let Some(state) = self.tab_mut(tab) else {
            return false;
        };
        let applied = state.store.apply_patch(key_column, key, patch);
        if applied {
            state.reproject();
        }
        applied
    }

    fn set_status(&mut self, tab: &str, status: ActionStatus) {
        if let Some(state) = self.tab_mut(tab) {
            state.status = status;
        }
    }

    /// リモート操作を 実行中 → 成功/失敗 の状況付きで実行する
    pub async fn track<T, F>(&mut self, tab: &str, label: &str, action: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.set_status(tab, ActionStatus::Pending(label.to_string()));
        let result = action.await;
        let status = match &result {
            Ok(_) => ActionStatus::Success(label.to_string()),
            Err(e) => ActionStatus::Error {
                label: label.to_string(),
                kind: e.kind(),
                message: e.to_string(),
            },
        };
        self.set_status(tab, status);
        result
    }

    /// 全タブを並行して読み込む。失敗したタブは前のスナップショットのまま
    pub async fn refresh_all<A: SheetsApi>(&mut self, gateway: &SheetGateway<A>) -> Vec<SheetError> {
        let names: Vec<String> = self.tabs.iter().map(|t| t.name.clone()).collect();
        for name in &names {
            self.set_status(name, ActionStatus::Pending("読み込み".into()));
        }

        let sheets: Vec<&str> = names.iter().map(String::as_str).collect();
        let outcomes = gateway.load_many(&sheets).await;

        let mut errors = Vec::new();
        for (name, outcome) in names.iter().zip(outcomes) {
            match outcome.error {
                None => {
                    self.replace_snapshot(name, outcome.store);
                    self.set_status(name, ActionStatus::Success("読み込み".into()));
                }
                Some(e) => {
                    self.set_status(
                        name,
                        ActionStatus::Error {
                            label: "読み込み".into(),
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                    );
                    errors.push(e);
                }
            }
        }
        errors
    }

    /// キー指定で保存し、成功したらローカルに反映する
    pub async fn save_record<A: SheetsApi>(
        &mut self,
        gateway: &SheetGateway<A>,
        tab: &str,
        key_column: &str,
        key: &str,
        patch: &Patch,
    ) -> Result<UpsertOutcome> {
        let outcome = self
            .track(tab, "保存", gateway.upsert_by_key(tab, key_column, key, patch))
            .await?;
        self.apply_confirmed_patch(tab, key_column, key, patch);
        Ok(outcome)
    }

    pub async fn delete_record<A: SheetsApi>(
        &mut self,
        gateway: &SheetGateway<A>,
        tab: &str,
        key_column: &str,
        key: &str,
    ) -> Result<ClearOutcome> {
        let outcome = self
            .track(tab, "削除", gateway.clear_by_key(tab, key_column, key))
            .await?;
        if let Some(state) = self.tab_mut(tab) {
            if state.store.remove_by_key(key_column, key) {
                state.reproject();
            }
        }
        Ok(outcome)
    }
}
