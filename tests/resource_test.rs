//! リソースCRUDテスト
//!
//! 組み込みのリソース定義でローカルワークブックを操作し、
//! リモートとローカルのスナップショットの両方を検証

use sheetdesk::error::ErrorKind;
use sheetdesk::gateway::{ClearOutcome, LocalWorkbook, SheetGateway};
use sheetdesk::resource::{resource_config, ResourceManager};
use sheetdesk_common::codec::{CostBreakdown, CostItem, TaskBuckets};
use sheetdesk_common::{ColumnFilter, Patch, ResourceConfig, SortDirection, SortSpec, ViewState};

fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn workbook() -> LocalWorkbook {
    LocalWorkbook::new()
        .with_sheet(
            "Clients",
            table(&[
                &["Client ID", "Name", "Status", "Created Date", "Notes"],
                &["CL-100", "Smith", "Active", "2024-03-01", ""],
                &["CL-200", "Jones", "", "2024-01-15", "Smith referred this client"],
                &["CL-300", "Brown", "Archived", "not a date", ""],
            ]),
        )
        .with_sheet(
            "Projects",
            table(&[
                &["ProjectID", "Project Name", "Status", "Cost Breakdown"],
                &["PR-1", "Gala", "Planning", r#"[{"name":"Rental","cost":"150"}]"#],
                &["PR-2", "Expo", "Active", "{broken"],
            ]),
        )
}

fn builtin(name: &str) -> ResourceConfig {
    ResourceConfig::builtin(name).unwrap()
}

/// 検索語はどの列に含まれていても一致する
#[tokio::test]
async fn test_list_search_any_column() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    let projection = clients.list(&ViewState::default().with_search("smith"));
    let ids: Vec<&str> = projection.rows.iter().map(|r| r.cells[0].as_str()).collect();
    assert_eq!(ids, vec!["CL-100", "CL-200"]);
    assert_eq!(projection.total, 3);
}

/// 空のステータスは既定値として絞り込まれる
#[tokio::test]
async fn test_list_status_filter_uses_default() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    let view = ViewState::default().with_filter(ColumnFilter::new("Status", "New").with_default("New"));
    let projection = clients.list(&view);
    assert_eq!(projection.rows.len(), 1);
    assert_eq!(projection.rows[0].sheet_row, 3);
}

/// 日付列の並べ替えで解釈できない日付は最も古い扱い
#[tokio::test]
async fn test_list_date_sort_unparsable_first() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    let kind = clients.config().sort_kind("Created Date");
    let view = ViewState::default()
        .sorted_by(SortSpec::new("Created Date", SortDirection::Ascending, kind))
        .with_columns(["Client ID"]);
    let projection = clients.list(&view);
    let ids: Vec<&str> = projection.rows.iter().map(|r| r.cells[0].as_str()).collect();
    assert_eq!(ids, vec!["CL-300", "CL-200", "CL-100"]);
    assert_eq!(projection.columns, vec!["Client ID"]);
}

/// 作成するとIDが採番され、ステータスに既定値が入る
#[tokio::test]
async fn test_create_assigns_id_and_default_status() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    let fields = Patch::new().with("Name", "Green").with("Email", "green@example.com");
    let (id, outcome) = clients.create(fields).await.unwrap();
    assert!(id.starts_with("CL-"));
    assert_eq!(outcome.row_number, 5);
    // 設定の項目のうちシートにない列が設定順に追加される
    assert_eq!(outcome.added_columns, vec!["Company", "Email", "Phone", "Source"]);

    let record = clients.get(&id).unwrap();
    assert_eq!(record.value("Status"), "New");
    assert_eq!(record.value("Email"), "green@example.com");
    assert_eq!(record.sheet_row(), 5);

    let grid = gateway.api().sheet("Clients").unwrap();
    assert_eq!(grid[4][0], id);
    assert_eq!(grid[4][2], "New");
}

/// キー列への入力は大文字小文字が違っても採番したIDで置き換わる
#[tokio::test]
async fn test_create_ignores_key_column_in_any_case() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    let fields = Patch::new().with("client id", "MINE").with("Name", "A");
    let (id, _) = clients.create(fields).await.unwrap();
    assert_eq!(clients.get(&id).unwrap().value("Name"), "A");

    clients.refresh().await.unwrap();
    assert_eq!(clients.get(&id).unwrap().value("Name"), "A");
    assert!(clients.get("MINE").is_none());
}

/// 作成後のローカルのスナップショットは読み直した内容と一致する
#[tokio::test]
async fn test_create_snapshot_matches_reload() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    let fields = Patch::new()
        .with(" Website ", "https://example.com")
        .with("status", "Lead");
    let (id, _) = clients.create(fields).await.unwrap();
    let local_headers = clients.store().headers().to_vec();
    let local_row = clients.get(&id).unwrap().cells().to_vec();
    assert_eq!(clients.get(&id).unwrap().get("Website"), Some("https://example.com"));
    assert_eq!(clients.get(&id).unwrap().value("Status"), "Lead");

    clients.refresh().await.unwrap();
    assert_eq!(clients.store().headers(), local_headers.as_slice());
    assert_eq!(clients.get(&id).unwrap().cells(), local_row.as_slice());
}

/// 空のシートには設定の項目順でヘッダーが作られる
#[tokio::test]
async fn test_create_on_empty_sheet_uses_configured_order() {
    let gateway = SheetGateway::new(LocalWorkbook::new().with_sheet("Staff", Vec::new()));
    let mut staff = ResourceManager::new(&gateway, builtin("Staff"));
    staff.refresh().await.unwrap();

    let (id, outcome) = staff.create(Patch::new().with("name", "Kim")).await.unwrap();
    assert_eq!(outcome.row_number, 2);

    staff.refresh().await.unwrap();
    assert_eq!(
        staff.store().headers(),
        &["Staff ID", "Name", "Email", "Phone", "Roles", "Status", "Image URL"]
    );
    let record = staff.get(&id).unwrap();
    assert_eq!(record.value("Name"), "Kim");
    assert_eq!(record.value("Status"), "Active");
}

/// 既存IDと同じ時刻でも重ならないIDになる
#[tokio::test]
async fn test_next_id_bumps_past_existing() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    assert_eq!(clients.next_id(50), "CL-301");
    assert_eq!(clients.next_id(300), "CL-301");
    assert_eq!(clients.next_id(1_000), "CL-1000");
}

/// 数値の上限に達したIDがあっても現在時刻のIDにする
#[tokio::test]
async fn test_next_id_at_numeric_limit() {
    let workbook = LocalWorkbook::new().with_sheet(
        "Clients",
        table(&[&["Client ID", "Name"], &["CL-9223372036854775807", "Max"]]),
    );
    let gateway = SheetGateway::new(workbook);
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    assert_eq!(clients.next_id(1_000), "CL-1000");
}

/// 更新はリモートとローカルの対象列だけを変える
#[tokio::test]
async fn test_update_patches_local_snapshot() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    clients
        .update("CL-200", &Patch::new().with("Status", "Contacted"))
        .await
        .unwrap();

    let record = clients.get("CL-200").unwrap();
    assert_eq!(record.value("Status"), "Contacted");
    assert_eq!(record.value("Notes"), "Smith referred this client");
    assert_eq!(gateway.api().sheet("Clients").unwrap()[2][2], "Contacted");
}

/// 失敗した更新はローカルのスナップショットを変えない
#[tokio::test]
async fn test_failed_update_keeps_snapshot() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();
    let before = clients.store().clone();

    gateway.api().lock_sheet("Clients");
    let err = clients
        .update("CL-100", &Patch::new().with("Status", "Lost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportError);
    assert_eq!(clients.store(), &before);

    gateway.api().unlock_sheet("Clients");
    let err = clients
        .update("CL-999", &Patch::new().with("Status", "Lost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RowNotFoundError);
    assert_eq!(clients.store().rows(), before.rows());
}

/// 読み込みに失敗しても前のスナップショットを保持する
#[tokio::test]
async fn test_failed_refresh_keeps_snapshot() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    gateway.api().lock_sheet("Clients");
    let err = clients.refresh().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoadError);
    assert_eq!(clients.store().len(), 3);
}

/// 削除はローカルから消え、2回目は該当なしで成功する
#[tokio::test]
async fn test_delete() {
    let gateway = SheetGateway::new(workbook());
    let mut clients = ResourceManager::new(&gateway, builtin("Clients"));
    clients.refresh().await.unwrap();

    let outcome = clients.delete("CL-100").await.unwrap();
    assert_eq!(outcome, ClearOutcome::Cleared { row_number: 2 });
    assert!(clients.get("CL-100").is_none());
    assert_eq!(clients.store().len(), 2);

    assert_eq!(clients.delete("CL-100").await.unwrap(), ClearOutcome::NotFound);
}

/// 費用内訳に項目を追加して書き戻し、読み直すと同じ内容になる
#[tokio::test]
async fn test_cost_breakdown_round_trip() {
    let gateway = SheetGateway::new(workbook());
    let mut projects = ResourceManager::new(&gateway, builtin("Projects"));
    projects.refresh().await.unwrap();

    let mut costs = projects
        .read_collection::<CostBreakdown>("PR-1", "Cost Breakdown")
        .unwrap()
        .into_value();
    costs.push(CostItem::new("Tax", "12"));
    projects
        .write_collection("PR-1", "Cost Breakdown", &costs)
        .await
        .unwrap();

    projects.refresh().await.unwrap();
    let decoded = projects
        .read_collection::<CostBreakdown>("PR-1", "Cost Breakdown")
        .unwrap();
    assert!(decoded.is_ok());
    assert_eq!(
        decoded.value,
        CostBreakdown(vec![CostItem::new("Rental", "150"), CostItem::new("Tax", "12")])
    );
    assert_eq!(decoded.value.total(), 162.0);
}

/// 壊れたセルは空のコレクションと診断になる
#[tokio::test]
async fn test_read_collection_broken_cell() {
    let gateway = SheetGateway::new(workbook());
    let mut projects = ResourceManager::new(&gateway, builtin("Projects"));
    projects.refresh().await.unwrap();

    let decoded = projects
        .read_collection::<CostBreakdown>("PR-2", "Cost Breakdown")
        .unwrap();
    assert!(decoded.value.0.is_empty());
    assert!(decoded.error.is_some());

    let err = projects
        .read_collection::<CostBreakdown>("PR-9", "Cost Breakdown")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RowNotFoundError);
}

/// JSON列として定義されていない列・形の違う型では読み書きできない
#[tokio::test]
async fn test_collection_column_must_match_config() {
    let gateway = SheetGateway::new(workbook());
    let mut projects = ResourceManager::new(&gateway, builtin("Projects"));
    projects.refresh().await.unwrap();

    let err = projects
        .read_collection::<CostBreakdown>("PR-1", "Project Name")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);

    let err = projects
        .read_collection::<TaskBuckets>("PR-1", "Cost Breakdown")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);

    let err = projects
        .write_collection("PR-1", "Project Name", &CostBreakdown::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert_eq!(gateway.api().sheet("Projects").unwrap()[1][1], "Gala");
}

/// JSONファイルで定義したリソースでも作成できる
#[tokio::test]
async fn test_resource_config_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vendors.json");
    std::fs::write(
        &path,
        r#"{"sheet":"Vendors","key_column":"Vendor ID","id_prefix":"VN","fields":["Name","Phone"]}"#,
    )
    .unwrap();

    let config = resource_config("vendors", Some(path.as_path())).unwrap().unwrap();
    assert_eq!(config.key_column, "Vendor ID");
    // 別のシート名なら組み込み定義を使う
    let clients = resource_config("Clients", Some(path.as_path())).unwrap().unwrap();
    assert_eq!(clients.key_column, "Client ID");
    assert!(resource_config("Unknown", Some(path.as_path())).unwrap().is_none());

    let gateway = SheetGateway::new(LocalWorkbook::new().with_sheet("Vendors", Vec::new()));
    let mut vendors = ResourceManager::new(&gateway, config);
    vendors.refresh().await.unwrap();
    let (id, _) = vendors.create(Patch::new().with("Name", "Acme")).await.unwrap();
    assert!(id.starts_with("VN-"));

    vendors.refresh().await.unwrap();
    assert_eq!(vendors.store().headers(), &["Vendor ID", "Name", "Phone"]);
    assert_eq!(vendors.get(&id).unwrap().value("Name"), "Acme");

    std::fs::write(&path, r#"{"sheet":"Vendors","key_column":"","id_prefix":"VN"}"#).unwrap();
    let err = resource_config("Vendors", Some(path.as_path())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);
}
