use clap::Parser;
use sheetdesk::cli::{self, Cli, Commands};
use sheetdesk::config::Config;
use sheetdesk::gateway::{ClearOutcome, GoogleSheetsClient, LocalWorkbook, SheetGateway, SheetsApi};
use sheetdesk::resource::{resource_config, ResourceManager};
use sheetdesk_common::projection::group_by_column;
use sheetdesk_common::{
    project, summarize, CollectionKind, ColumnFilter, SortDirection, SortKind, SortSpec, ViewState,
};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = Config::load()?;

    if let Commands::Config { set_token, set_spreadsheet, set_local, show } = cli.command {
        return run_config(&mut config, set_token, set_spreadsheet, set_local, show);
    }

    match cli.local.or_else(|| config.local_workbook.clone()) {
        Some(path) => {
            println!("- ローカルワークブック: {}", path.display());
            let workbook = LocalWorkbook::open(&path)?;
            run(SheetGateway::new(workbook), cli.command, cli.resource.as_deref()).await
        }
        None => {
            let client = GoogleSheetsClient::from_config(&config)?;
            run(SheetGateway::new(client), cli.command, cli.resource.as_deref()).await
        }
    }
}

async fn run<A: SheetsApi>(
    gateway: SheetGateway<A>,
    command: Commands,
    resource_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Load { sheet, search, filter, sort, desc, date, columns } => {
            println!("📋 {} を読み込み中...", sheet);
            let store = gateway.load(&sheet).await?;
            let resource = resource_config(&sheet, resource_path)?;

            let mut view = ViewState::default().with_search(search).with_columns(columns);
            for (column, value) in filter {
                let mut filter = ColumnFilter::new(column.clone(), value);
                // ステータス未入力の行は既定値として絞り込む
                if let Some(r) = &resource {
                    if r.status_column.as_deref() == Some(column.as_str()) {
                        filter = filter.with_default(r.default_status.clone());
                    }
                }
                view = view.with_filter(filter);
            }
            if let Some(column) = sort {
                let kind = if date {
                    SortKind::Date
                } else {
                    resource.as_ref().map_or(SortKind::Text, |r| r.sort_kind(&column))
                };
                let direction = if desc { SortDirection::Descending } else { SortDirection::Ascending };
                view = view.sorted_by(SortSpec::new(column, direction, kind));
            }

            let projection = project(&store, &view);
            println!("{}", projection.columns.join(" | "));
            for row in &projection.rows {
                println!("{}", row.cells.join(" | "));
            }
            println!("\n✔ {}件 / 全{}件", projection.rows.len(), projection.total);
        }

        Commands::Get { range } => {
            let rows = gateway.api().get_values(&range).await?;
            for row in &rows {
                println!("{}", row.join(" | "));
            }
            println!("\n✔ {}: {}行", range, rows.len());
        }

        Commands::Create { resource, values } => {
            let config = resource_config(&resource, resource_path)?
                .ok_or_else(|| anyhow::anyhow!("リソース定義が見つかりません: {}", resource))?;
            println!("[1/2] {} を読み込み中...", config.sheet);
            let mut manager = ResourceManager::new(&gateway, config);
            manager.refresh().await?;
            println!("✔ {}件\n", manager.store().len());

            println!("[2/2] 作成中...");
            let (id, outcome) = manager.create(cli::to_patch(&values)).await?;
            if !outcome.added_columns.is_empty() {
                println!("- 列を追加: {}", outcome.added_columns.join(", "));
            }
            println!("✔ {} を行{}に作成", id, outcome.row_number);
        }

        Commands::Upsert { sheet, key_column, key, values } => {
            let patch = cli::to_patch(&values);
            let outcome = gateway.upsert_by_key(&sheet, &key_column, &key, &patch).await?;
            if !outcome.added_columns.is_empty() {
                println!("- 列を追加: {}", outcome.added_columns.join(", "));
            }
            println!("✔ {} 行{}を更新", sheet, outcome.row_number);
        }

        Commands::Append { sheet, values } => {
            let record = cli::to_patch(&values);
            let outcome = gateway.append(&sheet, &record).await?;
            if !outcome.added_columns.is_empty() {
                println!("- 列を追加: {}", outcome.added_columns.join(", "));
            }
            if outcome.reused_slot {
                println!("- 空行を再利用");
            }
            println!("✔ {} 行{}に追記", sheet, outcome.row_number);
        }

        Commands::Delete { sheet, key_column, key } => {
            match gateway.clear_by_key(&sheet, &key_column, &key).await? {
                ClearOutcome::Cleared { row_number } => println!("✔ {} 行{}を消去", sheet, row_number),
                ClearOutcome::NotFound => println!("- {}={} の行はありません（削除済み）", key_column, key),
            }
        }

        Commands::Board { sheet, by, default } => {
            let store = gateway.load(&sheet).await?;
            let label_column = resource_config(&sheet, resource_path)?
                .map(|r| r.key_column)
                .or_else(|| store.headers().first().cloned())
                .unwrap_or_default();

            for (bucket, records) in group_by_column(store.records(), &by, &default) {
                println!("■ {} ({}件)", bucket, records.len());
                for record in records {
                    println!("  - {}", record.value(&label_column));
                }
            }
        }

        Commands::Summary { sheet } => {
            let store = gateway.load(&sheet).await?;
            let resource = resource_config(&sheet, resource_path)?;
            let (status_column, default_status) = resource
                .as_ref()
                .and_then(|r| Some((r.status_column.clone()?, r.default_status.clone())))
                .unwrap_or_else(|| ("Status".into(), String::new()));
            let cost_column = resource.as_ref().and_then(|r| {
                r.collections
                    .iter()
                    .find(|c| c.kind == CollectionKind::CostBreakdown)
                    .map(|c| c.column.clone())
            });

            let summary = summarize(&store, &status_column, &default_status, cost_column.as_deref());
            println!("📊 {}: {}件", summary.sheet, summary.records);
            for (status, count) in &summary.status_counts {
                println!("  {}: {}", status, count);
            }
            if cost_column.is_some() {
                println!("  費用合計: {:.2}", summary.cost_total);
                if summary.decode_failures > 0 {
                    println!("  ⚠ 費用内訳を読めない行: {}", summary.decode_failures);
                }
            }
        }

        Commands::Config { .. } => unreachable!("config is handled before the backend is built"),
    }

    Ok(())
}

fn run_config(
    config: &mut Config,
    set_token: Option<String>,
    set_spreadsheet: Option<String>,
    set_local: Option<PathBuf>,
    show: bool,
) -> anyhow::Result<()> {
    if let Some(token) = set_token {
        config.set_access_token(token)?;
        println!("✔ アクセストークンを設定しました");
    }

    if let Some(id) = set_spreadsheet {
        config.set_spreadsheet_id(id)?;
        println!("✔ スプレッドシートIDを設定しました");
    }

    if let Some(path) = set_local {
        config.set_local_workbook(path)?;
        println!("✔ ローカルワークブックを設定しました");
    }

    if show {
        println!("設定ファイル: {}", Config::config_path()?.display());
        println!("スプレッドシートID: {}", config.spreadsheet_id.as_deref().unwrap_or("(未設定)"));
        println!(
            "アクセストークン: {}",
            if config.access_token.is_some() { "設定済み" } else { "(未設定)" }
        );
        println!("APIエンドポイント: {}", config.api_base_url);
        println!("タイムアウト: {}秒", config.timeout_seconds);
        if let Some(path) = &config.local_workbook {
            println!("ローカルワークブック: {}", path.display());
        }
    }

    Ok(())
}
