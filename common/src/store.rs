//! シートのスナップショット（TabularStore）
//!
//! リモートのシートから最後に取得したヘッダーと行を保持し、
//! 列名から位置への解決を読み込みごとに一度だけ行う。
//!
//! - 1行目がヘッダー、以降がレコード
//! - 空行は読み込み時に除外
//! - ヘッダーより短い行は空文字で補完（常にヘッダー幅に揃える）

use std::collections::HashMap;

/// レコードのオブジェクト表現（ヘッダー → 値）
pub type RecordObject = HashMap<String, String>;

/// 列名 → 値の書き込みパッチ
///
/// 挿入順を保持する。同じ列を再設定すると値だけ置き換わる。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    fields: Vec<(String, String)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Patch {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut patch = Patch::new();
        for (column, value) in iter {
            patch.set(column, value);
        }
        patch
    }
}

/// 全セルが空文字の行か（空白だけのセルは値として扱う）
pub fn is_blank_row(cells: &[String]) -> bool {
    cells.iter().all(|c| c.is_empty())
}

/// 大文字小文字・前後空白を無視したヘッダー比較用のキー
pub fn header_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// 1シート分のスナップショット
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularStore {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    /// 各行のシート上の行番号（1始まり、ヘッダーが1行目）
    row_numbers: Vec<usize>,
    columns: HashMap<String, usize>,
}

impl TabularStore {
    /// 空のストア（アプリ起動時・読み込み失敗時）
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// APIが返したセル値からストアを構築
    pub fn from_values(name: impl Into<String>, values: Vec<Vec<String>>) -> Self {
        let mut values = values.into_iter();
        let headers = values.next().unwrap_or_default();
        let width = headers.len();

        let mut rows = Vec::new();
        let mut row_numbers = Vec::new();
        for (offset, mut row) in values.enumerate() {
            if is_blank_row(&row) {
                continue;
            }
            if row.len() > width {
                log::debug!("行{}: ヘッダー外のセル{}個を無視", offset + 2, row.len() - width);
            }
            row.resize(width, String::new());
            rows.push(row);
            row_numbers.push(offset + 2);
        }

        let columns = index_headers(&headers);
        Self {
            name: name.into(),
            headers,
            rows,
            row_numbers,
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 列位置（0始まり）。存在しない列は`None`
    pub fn index_of(&self, header: &str) -> Option<usize> {
        self.columns.get(header).copied()
    }

    /// 大文字小文字・前後空白を無視して列位置を探す
    pub fn index_of_loose(&self, header: &str) -> Option<usize> {
        let key = header_key(header);
        self.headers.iter().position(|h| header_key(h) == key)
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        (index < self.rows.len()).then_some(Record { store: self, index })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        (0..self.rows.len()).map(move |index| Record { store: self, index })
    }

    /// キー列の値が一致する最初の行
    pub fn find_by_key(&self, key_column: &str, key: &str) -> Option<Record<'_>> {
        let column = self.index_of(key_column)?;
        self.rows
            .iter()
            .position(|row| row[column] == key)
            .map(|index| Record { store: self, index })
    }

    /// 全行をヘッダー → 値のオブジェクトに変換
    pub fn to_record_objects(&self) -> Vec<RecordObject> {
        self.records().map(|r| r.to_object()).collect()
    }

    /// 確定済みの書き込みをローカルに反映する
    ///
    /// 同じキーで行を探し直し、パッチに含まれる列だけを書き換える。
    /// 未知の列はリモートと同じく末尾に追加する。行が見つからなければ何もしない。
    pub fn apply_patch(&mut self, key_column: &str, key: &str, patch: &Patch) -> bool {
        let Some(row) = self.find_by_key(key_column, key).map(|r| r.index) else {
            return false;
        };

        for (column, value) in patch.iter() {
            if column.trim().is_empty() {
                continue;
            }
            let index = match self.index_of(column) {
                Some(index) => index,
                None => self.add_column(column),
            };
            self.rows[row][index] = value.to_string();
        }
        true
    }

    /// 追記済みのレコードをローカルに挿入する
    ///
    /// 列の照合は大文字小文字を無視し、新しい列名は前後の空白を落として追加する
    /// （追記時のヘッダー追加と同じ）。行はシート上の行番号順に並ぶ位置へ入る。
    pub fn insert_record(&mut self, sheet_row: usize, record: &Patch) {
        let mut cells = vec![String::new(); self.width()];
        for (column, value) in record.iter() {
            if column.trim().is_empty() {
                continue;
            }
            let index = match self.index_of_loose(column) {
                Some(index) => index,
                None => {
                    let index = self.add_column(column.trim());
                    cells.push(String::new());
                    index
                }
            };
            cells[index] = value.to_string();
        }

        if is_blank_row(&cells) {
            return;
        }

        let position = self
            .row_numbers
            .iter()
            .position(|n| *n > sheet_row)
            .unwrap_or(self.rows.len());
        self.rows.insert(position, cells);
        self.row_numbers.insert(position, sheet_row);
    }

    /// 消去済みのレコードをローカルから取り除く
    pub fn remove_by_key(&mut self, key_column: &str, key: &str) -> bool {
        match self.find_by_key(key_column, key).map(|r| r.index) {
            Some(index) => {
                self.rows.remove(index);
                self.row_numbers.remove(index);
                true
            }
            None => false,
        }
    }

    /// 列を末尾に追加し、全行を新しい幅に揃える
    fn add_column(&mut self, header: &str) -> usize {
        let index = self.headers.len();
        self.headers.push(header.to_string());
        self.columns.entry(header.to_string()).or_insert(index);
        for row in &mut self.rows {
            row.resize(index + 1, String::new());
        }
        index
    }
}

fn index_headers(headers: &[String]) -> HashMap<String, usize> {
    let mut columns = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        // 重複ヘッダーは最初の列を採用
        columns.entry(header.clone()).or_insert(index);
    }
    columns
}

/// ストア内の1レコードへの参照
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    store: &'a TabularStore,
    index: usize,
}

impl<'a> Record<'a> {
    /// 列の値。列が存在しなければ`None`
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let column = self.store.index_of(column)?;
        Some(self.store.cell(self.index, column))
    }

    /// 列の値。列が存在しなければ空文字
    pub fn value(&self, column: &str) -> &'a str {
        self.get(column).unwrap_or("")
    }

    pub fn cells(&self) -> &'a [String] {
        &self.store.rows[self.index]
    }

    pub fn headers(&self) -> &'a [String] {
        &self.store.headers
    }

    /// ストア内の位置（0始まり）
    pub fn index(&self) -> usize {
        self.index
    }

    /// シート上の行番号（1始まり）
    pub fn sheet_row(&self) -> usize {
        self.store.row_numbers[self.index]
    }

    pub fn to_object(&self) -> RecordObject {
        let mut object = RecordObject::new();
        for (header, value) in self.store.headers.iter().zip(self.cells()) {
            object.entry(header.clone()).or_insert_with(|| value.clone());
        }
        object
    }
}
