//! リソース（シート）定義
//!
//! 顧客・案件・タスク・衣装・機材・スタッフ・問い合わせの各シートについて、
//! キー列・ID接頭辞・項目・日付列・ステータス既定値・セル内JSON列を定義する。
//! 汎用CRUDはこの設定値だけを受け取って動作する。

use crate::codec::ShapeHint;
use crate::error::{Error, Result};
use crate::projection::SortKind;
use serde::{Deserialize, Serialize};

/// セル内JSON列の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    CostBreakdown,
    EquipmentIds,
    StaffAssignments,
    Subtasks,
    TaskLinks,
    TaskBuckets,
}

impl CollectionKind {
    pub fn hint(self) -> ShapeHint {
        match self {
            CollectionKind::TaskBuckets => ShapeHint::Object,
            _ => ShapeHint::Array,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionColumn {
    pub column: String,
    pub kind: CollectionKind,
}

/// 1シート分のリソース設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub sheet: String,
    pub key_column: String,
    /// 新規ID の接頭辞（例: `CL` → `CL-1718000000000`）
    pub id_prefix: String,
    /// 新規作成フォームの項目（キー列を除く）
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub date_columns: Vec<String>,
    #[serde(default)]
    pub status_column: Option<String>,
    /// ステータス未入力時に表示・絞り込みで使う値
    #[serde(default)]
    pub default_status: String,
    #[serde(default)]
    pub collections: Vec<CollectionColumn>,
}

impl ResourceConfig {
    pub fn new(sheet: &str, key_column: &str, id_prefix: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            key_column: key_column.to_string(),
            id_prefix: id_prefix.to_string(),
            fields: Vec::new(),
            date_columns: Vec::new(),
            status_column: None,
            default_status: String::new(),
            collections: Vec::new(),
        }
    }

    fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    fn dates(mut self, columns: &[&str]) -> Self {
        self.date_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn status(mut self, column: &str, default: &str) -> Self {
        self.status_column = Some(column.to_string());
        self.default_status = default.to_string();
        self
    }

    fn collection(mut self, column: &str, kind: CollectionKind) -> Self {
        self.collections.push(CollectionColumn {
            column: column.to_string(),
            kind,
        });
        self
    }

    /// 列の並べ替え方法（日付列は日付比較）
    pub fn sort_kind(&self, column: &str) -> SortKind {
        if self.date_columns.iter().any(|c| c == column) {
            SortKind::Date
        } else {
            SortKind::Text
        }
    }

    pub fn collection_kind(&self, column: &str) -> Option<CollectionKind> {
        self.collections
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.kind)
    }

    /// JSON文字列から読み込み
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.sheet.trim().is_empty() || config.key_column.trim().is_empty() {
            return Err(Error::Config("sheet and key_column are required".into()));
        }
        Ok(config)
    }

    /// 組み込み定義をシート名で取得（大文字小文字を無視）
    pub fn builtin(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        builtins()
            .into_iter()
            .find(|c| c.sheet.to_lowercase() == name)
    }
}

/// 組み込みのリソース定義
pub fn builtins() -> Vec<ResourceConfig> {
    vec![
        ResourceConfig::new("Clients", "Client ID", "CL")
            .fields(&["Name", "Company", "Email", "Phone", "Status", "Source", "Notes", "Created Date"])
            .dates(&["Created Date", "Last Contact"])
            .status("Status", "New"),
        ResourceConfig::new("Projects", "ProjectID", "PR")
            .fields(&[
                "Project Name",
                "Client ID",
                "Status",
                "Start Date",
                "End Date",
                "Budget",
                "Cost Breakdown",
                "Assigned Staff",
                "Assigned Equipment",
                "Task Buckets",
                "Notes",
            ])
            .dates(&["Start Date", "End Date"])
            .status("Status", "Planning")
            .collection("Cost Breakdown", CollectionKind::CostBreakdown)
            .collection("Assigned Staff", CollectionKind::StaffAssignments)
            .collection("Assigned Equipment", CollectionKind::EquipmentIds)
            .collection("Task Buckets", CollectionKind::TaskBuckets),
        ResourceConfig::new("Tasks", "TaskID", "TK")
            .fields(&[
                "ProjectID",
                "Task Name",
                "Bucket",
                "Status",
                "Assignee",
                "Due Date",
                "Description",
                "Subtasks",
                "Links",
            ])
            .dates(&["Due Date"])
            .status("Status", "To Do")
            .collection("Subtasks", CollectionKind::Subtasks)
            .collection("Links", CollectionKind::TaskLinks),
        ResourceConfig::new("Costumes", "Costume ID", "CO")
            .fields(&["Name", "Category", "Size", "Status", "Image URL", "Notes"])
            .status("Status", "Available"),
        ResourceConfig::new("Equipment", "Equipment ID", "EQ")
            .fields(&["Name", "Category", "Status", "Image URL", "Notes"])
            .status("Status", "Available"),
        ResourceConfig::new("Staff", "Staff ID", "ST")
            .fields(&["Name", "Email", "Phone", "Roles", "Status", "Image URL"])
            .status("Status", "Active"),
        ResourceConfig::new("Submissions", "Submission ID", "SB")
            .fields(&["Name", "Email", "Phone", "Message", "Submitted At", "Status"])
            .dates(&["Submitted At"])
            .status("Status", "New"),
    ]
}
