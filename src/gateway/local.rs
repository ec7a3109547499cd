//! ローカルJSONワークブック
//!
//! Google Sheets API と同じレンジ解釈でメモリ上（または1つのJSONファイル）の
//! シートを読み書きする。オフライン作業とテストで使う。

use super::api::SheetsApi;
use crate::error::{Result, SheetError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sheetdesk_common::store::is_blank_row;
use sheetdesk_common::SheetRange;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

type Grid = Vec<Vec<String>>;

/// ワークブックファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkbookFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// シート名 → セル値
    sheets: BTreeMap<String, Grid>,
}

impl WorkbookFile {
    const CURRENT_VERSION: u32 = 1;
}

/// API呼び出しの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Update,
    Append,
    Clear,
}

/// 呼び出し履歴の1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub method: ApiMethod,
    pub range: String,
}

#[derive(Debug, Default)]
struct WorkbookState {
    sheets: BTreeMap<String, Grid>,
    locked: HashSet<String>,
    journal: Vec<ApiCall>,
}

#[derive(Debug, Default)]
pub struct LocalWorkbook {
    path: Option<PathBuf>,
    state: Mutex<WorkbookState>,
}

impl LocalWorkbook {
    /// メモリ上のみのワークブック
    pub fn new() -> Self {
        Self::default()
    }

    /// JSONファイルを開く（存在しなければ空で作成扱い）
    pub fn open(path: &Path) -> Result<Self> {
        let mut sheets = BTreeMap::new();

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let file: WorkbookFile = serde_json::from_reader(reader)?;
            if file.version != WorkbookFile::CURRENT_VERSION {
                return Err(SheetError::Config(format!(
                    "ワークブックのバージョンが不一致: {} (対応: {})",
                    file.version,
                    WorkbookFile::CURRENT_VERSION
                )));
            }
            sheets = file.sheets;
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            state: Mutex::new(WorkbookState {
                sheets,
                ..Default::default()
            }),
        })
    }

    pub fn with_sheet(self, name: &str, rows: Grid) -> Self {
        self.lock().sheets.insert(name.to_string(), rows);
        self
    }

    /// シートを作成（既存なら置き換え）して保存
    pub fn insert_sheet(&self, name: &str, rows: Grid) -> Result<()> {
        let mut state = self.lock();
        state.sheets.insert(name.to_string(), rows);
        self.persist(&state)
    }

    /// シートの生のセル値（末尾の空セルも含む）
    pub fn sheet(&self, name: &str) -> Option<Grid> {
        self.lock().sheets.get(name).cloned()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.lock().sheets.keys().cloned().collect()
    }

    /// 保護されたシートとして扱う（以降の呼び出しは権限エラー）
    pub fn lock_sheet(&self, name: &str) {
        self.lock().locked.insert(name.to_string());
    }

    pub fn unlock_sheet(&self, name: &str) {
        self.lock().locked.remove(name);
    }

    /// これまでの呼び出し履歴
    pub fn journal(&self) -> Vec<ApiCall> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    fn lock(&self) -> MutexGuard<'_, WorkbookState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, state: &WorkbookState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = WorkbookFile {
            version: WorkbookFile::CURRENT_VERSION,
            sheets: state.sheets.clone(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &file)?;
        Ok(())
    }

    /// 呼び出しを記録し、対象シートを取り出す
    fn begin<'a>(
        state: &'a mut WorkbookState,
        method: ApiMethod,
        range: &SheetRange,
    ) -> Result<&'a mut Grid> {
        state.journal.push(ApiCall {
            method,
            range: range.to_string(),
        });
        log::debug!("[local] {:?} {}", method, range);

        let name = range.sheet_name();
        if state.locked.contains(name) {
            return Err(SheetError::Transport {
                message: "The caller does not have permission".into(),
                status: Some(403),
            });
        }
        state.sheets.get_mut(name).ok_or_else(|| SheetError::Transport {
            message: format!("Unable to parse range: {}", range),
            status: Some(400),
        })
    }
}

/// 末尾の空セル・空行を落とす（APIの返却形式）
fn trimmed(rows: impl IntoIterator<Item = Vec<String>>) -> Grid {
    let mut rows: Grid = rows
        .into_iter()
        .map(|mut row| {
            while row.last().is_some_and(|c| c.is_empty()) {
                row.pop();
            }
            row
        })
        .collect();
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
    rows
}

/// 指定位置（0始まり）から値を書き込み、必要に応じてグリッドを広げる
fn write_block(grid: &mut Grid, top: usize, left: usize, rows: Vec<Vec<String>>) {
    for (r, values) in rows.into_iter().enumerate() {
        let row_index = top + r;
        if grid.len() <= row_index {
            grid.resize(row_index + 1, Vec::new());
        }
        let row = &mut grid[row_index];
        for (c, value) in values.into_iter().enumerate() {
            let col_index = left + c;
            if row.len() <= col_index {
                row.resize(col_index + 1, String::new());
            }
            row[col_index] = value;
        }
    }
}

fn cells(row: Option<&Vec<String>>, first: usize, last: usize) -> Vec<String> {
    (first..=last)
        .map(|c| {
            row.and_then(|r| r.get(c - 1))
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

#[async_trait]
impl SheetsApi for LocalWorkbook {
    async fn get_values(&self, range: &SheetRange) -> Result<Vec<Vec<String>>> {
        let mut state = self.lock();
        let grid = Self::begin(&mut state, ApiMethod::Get, range)?;

        let values = match range {
            SheetRange::Sheet(_) => trimmed(grid.iter().cloned()),
            SheetRange::Rows { first, last, .. } => {
                trimmed((*first..=*last).map(|r| grid.get(r - 1).cloned().unwrap_or_default()))
            }
            SheetRange::Cell { column, row, .. } => {
                trimmed(std::iter::once(cells(grid.get(row - 1), *column, *column)))
            }
            SheetRange::Row {
                row,
                first_column,
                last_column,
                ..
            } => trimmed(std::iter::once(cells(grid.get(row - 1), *first_column, *last_column))),
        };
        Ok(values)
    }

    async fn update_values(&self, range: &SheetRange, rows: Vec<Vec<String>>) -> Result<()> {
        let mut state = self.lock();
        let grid = Self::begin(&mut state, ApiMethod::Update, range)?;

        match range {
            SheetRange::Sheet(_) => write_block(grid, 0, 0, rows),
            SheetRange::Rows { first, .. } => write_block(grid, first - 1, 0, rows),
            SheetRange::Cell { column, row, .. } => write_block(grid, row - 1, column - 1, rows),
            SheetRange::Row {
                row,
                first_column,
                last_column,
                ..
            } => {
                let span = last_column - first_column + 1;
                if rows.len() > 1 || rows.iter().any(|r| r.len() > span) {
                    return Err(SheetError::Transport {
                        message: format!("Requested writing within range [{}], but tried writing outside it", range),
                        status: Some(400),
                    });
                }
                write_block(grid, row - 1, first_column - 1, rows);
            }
        }
        self.persist(&state)
    }

    async fn append_values(&self, range: &SheetRange, rows: Vec<Vec<String>>) -> Result<()> {
        let mut state = self.lock();
        let grid = Self::begin(&mut state, ApiMethod::Append, range)?;

        let next = grid
            .iter()
            .rposition(|r| !is_blank_row(r))
            .map(|last| last + 1)
            .unwrap_or(0);
        write_block(grid, next, 0, rows);
        self.persist(&state)
    }

    async fn clear_values(&self, range: &SheetRange) -> Result<()> {
        let mut state = self.lock();
        let grid = Self::begin(&mut state, ApiMethod::Clear, range)?;

        let (top, bottom, left, right) = match range {
            SheetRange::Sheet(_) => (1, grid.len(), 1, usize::MAX),
            SheetRange::Rows { first, last, .. } => (*first, *last, 1, usize::MAX),
            SheetRange::Cell { column, row, .. } => (*row, *row, *column, *column),
            SheetRange::Row {
                row,
                first_column,
                last_column,
                ..
            } => (*row, *row, *first_column, *last_column),
        };

        for row in grid.iter_mut().take(bottom).skip(top.saturating_sub(1)) {
            for (c, cell) in row.iter_mut().enumerate() {
                if c + 1 >= left && c + 1 <= right {
                    cell.clear();
                }
            }
        }
        self.persist(&state)
    }
}
