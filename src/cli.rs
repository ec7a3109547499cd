use clap::{Parser, Subcommand};
use sheetdesk_common::{Patch, SheetRange};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetdesk")]
#[command(about = "Google Sheetsをデータストアとして読み書きするツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Sheets APIの代わりにローカルのJSONワークブックを使う
    #[arg(long, global = true)]
    pub local: Option<PathBuf>,

    /// リソース定義JSON（組み込み定義より優先）
    #[arg(long = "resource", id = "resource_file", value_name = "RESOURCE", global = true)]
    pub resource: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// シートを読み込んで表示
    Load {
        /// シート名
        sheet: String,

        /// 全列を対象にした部分一致検索
        #[arg(short, long, default_value = "")]
        search: String,

        /// 列の完全一致フィルタ（列=値、複数指定可）
        #[arg(short, long, value_parser = parse_assignment)]
        filter: Vec<(String, String)>,

        /// 並べ替える列
        #[arg(long)]
        sort: Option<String>,

        /// 降順
        #[arg(long, requires = "sort")]
        desc: bool,

        /// 並べ替え列を日付として比較
        #[arg(long, requires = "sort")]
        date: bool,

        /// 表示する列（カンマ区切り）
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// A1形式のレンジをそのまま読む（例: 'Task Buckets'!A1:D1）
    Get {
        #[arg(value_parser = parse_range)]
        range: SheetRange,
    },

    /// リソース定義に従ってIDを採番し、レコードを作成
    Create {
        /// リソース（シート）名
        resource: String,

        /// 書き込む値（列=値）
        #[arg(value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },

    /// キー列の値が一致する行を更新
    Upsert {
        sheet: String,

        /// キー列
        key_column: String,

        /// キーの値
        key: String,

        /// 書き込む値（列=値）
        #[arg(required = true, value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },

    /// レコードを追記
    Append {
        sheet: String,

        /// 書き込む値（列=値）
        #[arg(required = true, value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },

    /// キー列の値が一致する行を消去
    Delete {
        sheet: String,
        key_column: String,
        key: String,
    },

    /// 列の値ごとにグループ化して表示（カンバン）
    Board {
        sheet: String,

        /// グループ化する列
        #[arg(long, default_value = "Status")]
        by: String,

        /// 値が空の行の表示先
        #[arg(long, default_value = "New")]
        default: String,
    },

    /// 件数・ステータス別件数・費用合計
    Summary {
        sheet: String,
    },

    /// 設定
    Config {
        /// アクセストークンを設定
        #[arg(long)]
        set_token: Option<String>,

        /// スプレッドシートIDを設定
        #[arg(long)]
        set_spreadsheet: Option<String>,

        /// 既定のローカルワークブックを設定
        #[arg(long)]
        set_local: Option<PathBuf>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}

/// `列=値` を分解（値は空でもよい）
pub fn parse_assignment(text: &str) -> Result<(String, String), String> {
    let (column, value) = text
        .split_once('=')
        .ok_or_else(|| format!("「列=値」の形式ではありません: {}", text))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("列名が空です: {}", text));
    }
    Ok((column.to_string(), value.to_string()))
}

pub fn parse_range(text: &str) -> Result<SheetRange, String> {
    SheetRange::parse(text).map_err(|e| e.to_string())
}

pub fn to_patch(values: &[(String, String)]) -> Patch {
    values.iter().cloned().collect()
}
