//! A1形式のレンジ表記
//!
//! リモートのシートAPIに渡すレンジ文字列を組み立て・解析する。
//!
//! | 種類 | 表記 |
//! |------|------|
//! | シート全体 | `Clients` |
//! | 行範囲（ヘッダー行） | `Clients!1:1` |
//! | 単一セル（書き込みアンカー） | `Clients!D1` |
//! | 単一行 | `Clients!A5:F5` |

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;

/// シート上のレンジ
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SheetRange {
    /// シート全体（使用済み範囲）
    Sheet(String),
    /// 行範囲（1始まり、両端含む）
    Rows { sheet: String, first: usize, last: usize },
    /// 単一セル（1始まり）
    Cell { sheet: String, column: usize, row: usize },
    /// 単一行の列範囲（1始まり、両端含む）
    Row {
        sheet: String,
        row: usize,
        first_column: usize,
        last_column: usize,
    },
}

impl SheetRange {
    pub fn sheet(name: impl Into<String>) -> Self {
        SheetRange::Sheet(name.into())
    }

    /// ヘッダー行（1行目）
    pub fn header_row(name: impl Into<String>) -> Self {
        SheetRange::Rows {
            sheet: name.into(),
            first: 1,
            last: 1,
        }
    }

    pub fn cell(name: impl Into<String>, column: usize, row: usize) -> Self {
        SheetRange::Cell {
            sheet: name.into(),
            column,
            row,
        }
    }

    /// A列から`width`列分の単一行
    pub fn row(name: impl Into<String>, row: usize, width: usize) -> Self {
        SheetRange::Row {
            sheet: name.into(),
            row,
            first_column: 1,
            last_column: width.max(1),
        }
    }

    pub fn sheet_name(&self) -> &str {
        match self {
            SheetRange::Sheet(sheet)
            | SheetRange::Rows { sheet, .. }
            | SheetRange::Cell { sheet, .. }
            | SheetRange::Row { sheet, .. } => sheet,
        }
    }

    /// A1表記の文字列を解析
    pub fn parse(input: &str) -> Result<Self> {
        lazy_static::lazy_static! {
            static ref RANGE_RE: Regex = Regex::new(r"^(?:'((?:[^']|'')+)'|([^!']+))(?:!(.+))?$").unwrap();
            static ref ROWS_RE: Regex = Regex::new(r"^(\d+):(\d+)$").unwrap();
            static ref CELL_RE: Regex = Regex::new(r"^([A-Za-z]+)(\d+)$").unwrap();
            static ref SPAN_RE: Regex = Regex::new(r"^([A-Za-z]+)(\d+):([A-Za-z]+)(\d+)$").unwrap();
        }

        let invalid = || Error::InvalidRange(input.to_string());

        let caps = RANGE_RE.captures(input.trim()).ok_or_else(invalid)?;
        let sheet = match (caps.get(1), caps.get(2)) {
            (Some(quoted), _) => quoted.as_str().replace("''", "'"),
            (None, Some(bare)) => bare.as_str().to_string(),
            (None, None) => return Err(invalid()),
        };

        let Some(reference) = caps.get(3).map(|m| m.as_str()) else {
            return Ok(SheetRange::Sheet(sheet));
        };

        let number = |s: &str| s.parse::<usize>().ok().filter(|n| *n > 0);

        if let Some(c) = ROWS_RE.captures(reference) {
            let first = number(&c[1]).ok_or_else(invalid)?;
            let last = number(&c[2]).ok_or_else(invalid)?;
            if last < first {
                return Err(invalid());
            }
            return Ok(SheetRange::Rows { sheet, first, last });
        }

        if let Some(c) = CELL_RE.captures(reference) {
            let column = column_index(&c[1]).ok_or_else(invalid)?;
            let row = number(&c[2]).ok_or_else(invalid)?;
            return Ok(SheetRange::Cell { sheet, column, row });
        }

        if let Some(c) = SPAN_RE.captures(reference) {
            let first_column = column_index(&c[1]).ok_or_else(invalid)?;
            let row = number(&c[2]).ok_or_else(invalid)?;
            let last_column = column_index(&c[3]).ok_or_else(invalid)?;
            let end_row = number(&c[4]).ok_or_else(invalid)?;
            // 複数行にまたがる矩形は扱わない
            if end_row != row || last_column < first_column {
                return Err(invalid());
            }
            return Ok(SheetRange::Row {
                sheet,
                row,
                first_column,
                last_column,
            });
        }

        Err(invalid())
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetRange::Sheet(sheet) => write!(f, "{}", quote_sheet_name(sheet)),
            SheetRange::Rows { sheet, first, last } => {
                write!(f, "{}!{}:{}", quote_sheet_name(sheet), first, last)
            }
            SheetRange::Cell { sheet, column, row } => {
                write!(f, "{}!{}{}", quote_sheet_name(sheet), column_letter(*column), row)
            }
            SheetRange::Row {
                sheet,
                row,
                first_column,
                last_column,
            } => write!(
                f,
                "{}!{}{}:{}{}",
                quote_sheet_name(sheet),
                column_letter(*first_column),
                row,
                column_letter(*last_column),
                row
            ),
        }
    }
}

/// 英数字とアンダースコア以外を含むシート名はシングルクォートで囲む
fn quote_sheet_name(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// 1始まりの列番号を列記号に変換（1 → A, 27 → AA）
///
/// 26進の全単射表記。0は空文字列を返す。
pub fn column_letter(index: usize) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// 列記号を1始まりの列番号に変換（A → 1, AA → 27）
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }

    let mut n: usize = 0;
    for c in letters.chars() {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        let digit = (c as u8 - b'A' + 1) as usize;
        n = n.checked_mul(26)?.checked_add(digit)?;
    }
    Some(n)
}
