//! レコードの射影（検索・絞り込み・並べ替え・グループ化）
//!
//! タブが表示するレコード集合を、ストアのスナップショットと表示状態から
//! 毎回まとめて再計算する。ストアは一切変更しない。

use crate::codec::parse_amount;
use crate::store::{Record, TabularStore};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// 並べ替えの比較方法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKind {
    /// 文字列比較
    #[default]
    Text,
    /// 日付として比較（解釈できない値はエポック0）
    Date,
    /// 数値として比較（解釈できない値は0）
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub kind: SortKind,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, direction: SortDirection, kind: SortKind) -> Self {
        Self {
            column: column.into(),
            direction,
            kind,
        }
    }
}

/// 列の完全一致フィルタ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    /// 空文字は「すべて」（無効）
    pub value: String,
    /// セルが空のときに代わりに比較する値（例: ステータス未設定 → "New"）
    #[serde(default)]
    pub default: Option<String>,
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn is_active(&self) -> bool {
        !self.value.is_empty()
    }

    pub fn matches(&self, record: &Record<'_>) -> bool {
        let cell = record.value(&self.column);
        let effective = if cell.trim().is_empty() {
            self.default.as_deref().unwrap_or("")
        } else {
            cell
        };
        effective == self.value
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Card,
}

/// タブごとの表示状態（リモートには保存しない）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub search: String,
    pub filters: Vec<ColumnFilter>,
    pub sort: Option<SortSpec>,
    /// 空なら全列を表示
    pub visible_columns: Vec<String>,
    pub view_mode: ViewMode,
}

impl ViewState {
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }

    pub fn with_filter(mut self, filter: ColumnFilter) -> Self {
        self.set_filter(filter);
        self
    }

    pub fn sorted_by(mut self, spec: SortSpec) -> Self {
        self.sort = Some(spec);
        self
    }

    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.visible_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// 同じ列のフィルタは置き換える
    pub fn set_filter(&mut self, filter: ColumnFilter) {
        match self.filters.iter_mut().find(|f| f.column == filter.column) {
            Some(existing) => *existing = filter,
            None => self.filters.push(filter),
        }
    }

    pub fn clear_filter(&mut self, column: &str) {
        self.filters.retain(|f| f.column != column);
    }

    /// 見出しクリック: 同じ列なら向きを反転、別の列なら昇順から
    pub fn toggle_sort(&mut self, column: &str, kind: SortKind) {
        self.sort = match self.sort.take() {
            Some(spec) if spec.column == column => {
                Some(SortSpec::new(column, spec.direction.flipped(), kind))
            }
            _ => Some(SortSpec::new(column, SortDirection::Ascending, kind)),
        };
    }
}

/// 射影結果の1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedRow {
    /// ストア内の位置
    pub index: usize,
    /// シート上の行番号
    pub sheet_row: usize,
    /// 表示列に絞ったセル
    pub cells: Vec<String>,
}

/// タブが描画する行と列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub columns: Vec<String>,
    pub rows: Vec<ProjectedRow>,
    /// 絞り込み前の件数
    pub total: usize,
    pub view_mode: ViewMode,
}

/// 検索語（大文字小文字無視の部分一致、いずれかのセル）と列フィルタで絞り込む
pub fn filter<'a>(
    records: impl IntoIterator<Item = Record<'a>>,
    search: &str,
    filters: &[ColumnFilter],
) -> Vec<Record<'a>> {
    let term = search.trim().to_lowercase();
    let active: Vec<&ColumnFilter> = filters.iter().filter(|f| f.is_active()).collect();

    records
        .into_iter()
        .filter(|record| matches_search(record, &term))
        .filter(|record| active.iter().all(|f| f.matches(record)))
        .collect()
}

/// `term`は小文字化済みであること
pub fn matches_search(record: &Record<'_>, term: &str) -> bool {
    term.is_empty()
        || record
            .cells()
            .iter()
            .any(|cell| cell.to_lowercase().contains(term))
}

/// 安定ソート
pub fn sort(records: &mut [Record<'_>], spec: &SortSpec) {
    records.sort_by(|a, b| {
        let ordering = compare_cells(a.value(&spec.column), b.value(&spec.column), spec.kind);
        match spec.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

fn compare_cells(a: &str, b: &str, kind: SortKind) -> Ordering {
    match kind {
        SortKind::Text => a.cmp(b),
        SortKind::Date => sort_timestamp(a).cmp(&sort_timestamp(b)),
        SortKind::Number => {
            let a = parse_amount(a).unwrap_or(0.0);
            let b = parse_amount(b).unwrap_or(0.0);
            a.total_cmp(&b)
        }
    }
}

/// 日付セルをUnixミリ秒に変換
///
/// 対応形式: RFC 3339、`YYYY-MM-DD[ HH:MM[:SS]]`、`YYYY-MM-DDTHH:MM[:SS]`、
/// `YYYY/MM/DD`、`MM/DD/YYYY[ HH:MM:SS]`。タイムゾーンなしはUTCとして扱う。
pub fn parse_timestamp(text: &str) -> Option<i64> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis());
        }
    }

    None
}

/// 並べ替え用のキー。解釈できない日付はエポック0
pub fn sort_timestamp(text: &str) -> i64 {
    parse_timestamp(text).unwrap_or(0)
}

/// キー関数でグループ化（最初に現れたキーの順を保持）
///
/// 空のキーは`default_bucket`に入る。
pub fn group<T, F>(items: impl IntoIterator<Item = T>, mut key_fn: F, default_bucket: &str) -> Vec<(String, Vec<T>)>
where
    F: FnMut(&T) -> String,
{
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for item in items {
        let key = key_fn(&item);
        let key = if key.trim().is_empty() {
            default_bucket.to_string()
        } else {
            key
        };

        match positions.get(&key) {
            Some(&position) => groups[position].1.push(item),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push((key, vec![item]));
            }
        }
    }

    groups
}

/// 列の値でグループ化（ステータス別ボードなど）
pub fn group_by_column<'a>(
    records: impl IntoIterator<Item = Record<'a>>,
    column: &str,
    default_bucket: &str,
) -> Vec<(String, Vec<Record<'a>>)> {
    group(records, |r| r.value(column).to_string(), default_bucket)
}

/// 絞り込みドロップダウン用の値一覧（出現順、空は`default`）
pub fn distinct_values(store: &TabularStore, column: &str, default: &str) -> Vec<String> {
    group_by_column(store.records(), column, default)
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}

/// 表示状態に従ってストアを射影する（絞り込み → 並べ替え → 列選択）
pub fn project(store: &TabularStore, view: &ViewState) -> Projection {
    let mut records = filter(store.records(), &view.search, &view.filters);
    if let Some(spec) = &view.sort {
        sort(&mut records, spec);
    }

    let column_indices: Vec<(String, usize)> = if view.visible_columns.is_empty() {
        store.headers().iter().cloned().zip(0..).collect()
    } else {
        view.visible_columns
            .iter()
            .filter_map(|c| store.index_of(c).map(|i| (c.clone(), i)))
            .collect()
    };

    let rows = records
        .iter()
        .map(|record| ProjectedRow {
            index: record.index(),
            sheet_row: record.sheet_row(),
            cells: column_indices
                .iter()
                .map(|(_, i)| record.cells()[*i].clone())
                .collect(),
        })
        .collect();

    Projection {
        columns: column_indices.into_iter().map(|(c, _)| c).collect(),
        rows,
        total: store.len(),
        view_mode: view.view_mode,
    }
}
