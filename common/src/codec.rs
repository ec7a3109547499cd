//! セル内JSONコレクションのコーデック
//!
//! 1つのセルにJSONで格納された入れ子のコレクション
//! （費用内訳、担当スタッフ、機材ID、サブタスク、リンク、タスクバケット）を
//! 型付きの値と相互変換する。
//!
//! デコード失敗はこの境界の外へ伝播しない。空のコレクションと診断情報を返す。

use serde::de::{self, DeserializeOwned, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// セル値の期待する形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeHint {
    /// `[...]`
    Array,
    /// `{...}`
    Object,
}

impl ShapeHint {
    pub fn empty_value(self) -> Value {
        match self {
            ShapeHint::Array => Value::Array(Vec::new()),
            ShapeHint::Object => Value::Object(serde_json::Map::new()),
        }
    }

    pub fn empty_literal(self) -> &'static str {
        match self {
            ShapeHint::Array => "[]",
            ShapeHint::Object => "{}",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            ShapeHint::Array => value.is_array(),
            ShapeHint::Object => value.is_object(),
        }
    }
}

/// デコード失敗の診断情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub shape: &'static str,
    pub message: String,
    /// 元のセル値（長い場合は先頭のみ）
    pub cell: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}のデコードに失敗: {} (セル: {:?})", self.shape, self.message, self.cell)
    }
}

impl std::error::Error for DecodeError {}

/// デコード結果。失敗時も`value`は常に有効（空のコレクション）
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub error: Option<DecodeError>,
}

impl<T> Decoded<T> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// セルに格納される入れ子コレクションの種類
pub trait EmbeddedShape: Serialize + DeserializeOwned + Default {
    const NAME: &'static str;
    const HINT: ShapeHint;
}

const CELL_PREVIEW_CHARS: usize = 80;

fn decode_failure(shape: &'static str, message: String, cell: &str) -> DecodeError {
    let error = DecodeError {
        shape,
        message,
        cell: cell.chars().take(CELL_PREVIEW_CHARS).collect(),
    };
    log::warn!("{}", error);
    error
}

/// セル値を型付きコレクションにデコード
///
/// 空セルは診断なしで空のコレクションになる。
pub fn decode<T: EmbeddedShape>(cell: &str) -> Decoded<T> {
    if cell.trim().is_empty() {
        return Decoded {
            value: T::default(),
            error: None,
        };
    }

    match serde_json::from_str::<T>(cell) {
        Ok(value) => Decoded { value, error: None },
        Err(e) => Decoded {
            value: T::default(),
            error: Some(decode_failure(T::NAME, e.to_string(), cell)),
        },
    }
}

/// 型を指定せずにデコード（形のみ検証）
pub fn decode_value(cell: &str, hint: ShapeHint) -> Decoded<Value> {
    let name = match hint {
        ShapeHint::Array => "array",
        ShapeHint::Object => "object",
    };

    if cell.trim().is_empty() {
        return Decoded {
            value: hint.empty_value(),
            error: None,
        };
    }

    match serde_json::from_str::<Value>(cell) {
        Ok(value) if hint.matches(&value) => Decoded { value, error: None },
        Ok(_) => Decoded {
            value: hint.empty_value(),
            error: Some(decode_failure(name, format!("expected {}", hint.empty_literal()), cell)),
        },
        Err(e) => Decoded {
            value: hint.empty_value(),
            error: Some(decode_failure(name, e.to_string(), cell)),
        },
    }
}

/// コレクションをセル値（JSON文字列）にエンコード
pub fn encode<T: EmbeddedShape>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("{}のエンコードに失敗: {}", T::NAME, e);
            T::HINT.empty_literal().to_string()
        }
    }
}

/// 文字列・数値・真偽値のいずれでも文字列として受け取る
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!("expected string, got {}", other))),
    }
}

fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Vec::<Value>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(de::Error::custom(format!("expected string, got {}", other))),
        })
        .collect()
}

// =============================================
// 費用内訳
// =============================================

/// 費用内訳の1項目
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostItem {
    #[serde(default)]
    pub name: String,
    /// シートに入力された表記のまま保持
    #[serde(default, deserialize_with = "lenient_string")]
    pub cost: String,
}

impl CostItem {
    pub fn new(name: impl Into<String>, cost: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cost: cost.into(),
        }
    }

    /// 金額（`$`と`,`を除去して解釈、解釈できなければ`None`）
    pub fn amount(&self) -> Option<f64> {
        parse_amount(&self.cost)
    }
}

/// `$1,250.50` のような金額表記を数値にする
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostBreakdown(pub Vec<CostItem>);

impl CostBreakdown {
    pub fn push(&mut self, item: CostItem) {
        self.0.push(item);
    }

    /// 解釈できない金額は0として合計
    pub fn total(&self) -> f64 {
        self.0.iter().filter_map(CostItem::amount).sum()
    }
}

impl EmbeddedShape for CostBreakdown {
    const NAME: &'static str = "cost breakdown";
    const HINT: ShapeHint = ShapeHint::Array;
}

// =============================================
// 機材ID・リンク
// =============================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EquipmentIds(#[serde(deserialize_with = "lenient_strings")] pub Vec<String>);

impl EquipmentIds {
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|e| e == id)
    }
}

impl EmbeddedShape for EquipmentIds {
    const NAME: &'static str = "assigned equipment";
    const HINT: ShapeHint = ShapeHint::Array;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskLinks(pub Vec<String>);

impl EmbeddedShape for TaskLinks {
    const NAME: &'static str = "task links";
    const HINT: ShapeHint = ShapeHint::Array;
}

// =============================================
// 担当スタッフ
// =============================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffAssignment {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaffAssignments(pub Vec<StaffAssignment>);

impl StaffAssignments {
    pub fn find(&self, id: &str) -> Option<&StaffAssignment> {
        self.0.iter().find(|a| a.id == id)
    }

    /// 担当を追加、既存なら役割を置き換え
    pub fn assign(&mut self, id: impl Into<String>, roles: Vec<String>) {
        let id = id.into();
        match self.0.iter_mut().find(|a| a.id == id) {
            Some(existing) => existing.roles = roles,
            None => self.0.push(StaffAssignment { id, roles }),
        }
    }

    pub fn unassign(&mut self, id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|a| a.id != id);
        self.0.len() != before
    }
}

impl EmbeddedShape for StaffAssignments {
    const NAME: &'static str = "assigned staff";
    const HINT: ShapeHint = ShapeHint::Array;
}

// =============================================
// サブタスク
// =============================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subtasks(pub Vec<Subtask>);

impl Subtasks {
    /// (完了数, 全体数)
    pub fn progress(&self) -> (usize, usize) {
        let done = self.0.iter().filter(|s| s.completed).count();
        (done, self.0.len())
    }

    pub fn toggle(&mut self, index: usize) -> bool {
        match self.0.get_mut(index) {
            Some(subtask) => {
                subtask.completed = !subtask.completed;
                true
            }
            None => false,
        }
    }
}

impl EmbeddedShape for Subtasks {
    const NAME: &'static str = "subtasks";
    const HINT: ShapeHint = ShapeHint::Array;
}

// =============================================
// タスクバケット
// =============================================

/// バケット名 → タスクIDのリスト（JSONオブジェクト、記述順を保持）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskBuckets(pub Vec<(String, Vec<String>)>);

impl TaskBuckets {
    pub fn bucket(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ids)| ids.as_slice())
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    /// タスクを指定バケットへ移動（他のバケットからは取り除く）
    pub fn move_task(&mut self, task_id: &str, bucket: &str) {
        for (_, ids) in &mut self.0 {
            ids.retain(|id| id != task_id);
        }
        match self.0.iter_mut().find(|(n, _)| n == bucket) {
            Some((_, ids)) => ids.push(task_id.to_string()),
            None => self.0.push((bucket.to_string(), vec![task_id.to_string()])),
        }
    }

    /// タスクが属するバケット名
    pub fn bucket_of(&self, task_id: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, ids)| ids.iter().any(|id| id == task_id))
            .map(|(n, _)| n.as_str())
    }
}

impl Serialize for TaskBuckets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, ids) in &self.0 {
            map.serialize_entry(name, ids)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TaskBuckets {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BucketsVisitor;

        impl<'de> Visitor<'de> for BucketsVisitor {
            type Value = TaskBuckets;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping bucket names to task id lists")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                #[derive(Deserialize)]
                struct Ids(#[serde(deserialize_with = "lenient_strings")] Vec<String>);

                let mut buckets: Vec<(String, Vec<String>)> = Vec::new();
                while let Some((name, Ids(ids))) = access.next_entry::<String, Ids>()? {
                    match buckets.iter_mut().find(|(n, _)| *n == name) {
                        Some(entry) => entry.1 = ids,
                        None => buckets.push((name, ids)),
                    }
                }
                Ok(TaskBuckets(buckets))
            }
        }

        deserializer.deserialize_map(BucketsVisitor)
    }
}

impl EmbeddedShape for TaskBuckets {
    const NAME: &'static str = "task buckets";
    const HINT: ShapeHint = ShapeHint::Object;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_not_json_array() {
        let decoded = decode_value("not json", ShapeHint::Array);
        assert_eq!(decoded.value, Value::Array(Vec::new()));
        assert!(decoded.error.is_some());
    }

    #[test]
    fn test_decode_wrong_shape() {
        let decoded = decode_value(r#"{"a":1}"#, ShapeHint::Array);
        assert_eq!(decoded.value, serde_json::json!([]));
        assert!(decoded.error.unwrap().message.contains("[]"));

        let decoded = decode_value("[1]", ShapeHint::Object);
        assert_eq!(decoded.value, serde_json::json!({}));
    }

    #[test]
    fn test_decode_empty_cell_has_no_diagnostic() {
        let decoded = decode::<CostBreakdown>("  ");
        assert!(decoded.is_ok());
        assert!(decoded.value.0.is_empty());
    }

    #[test]
    fn test_decode_typed_failure() {
        let decoded = decode::<Subtasks>("[{\"name\": ");
        assert!(decoded.value.0.is_empty());
        let error = decoded.error.unwrap();
        assert_eq!(error.shape, "subtasks");
        assert!(error.to_string().contains("subtasks"));
    }

    #[test]
    fn test_cost_breakdown_append_roundtrip() {
        let cell = r#"[{"name":"Rental","cost":"150"}]"#;
        let mut breakdown = decode::<CostBreakdown>(cell).into_value();
        breakdown.push(CostItem::new("Tax", "12"));

        let encoded = encode(&breakdown);
        let decoded = decode::<CostBreakdown>(&encoded);
        assert!(decoded.is_ok());
        assert_eq!(
            decoded.value,
            CostBreakdown(vec![CostItem::new("Rental", "150"), CostItem::new("Tax", "12")])
        );
    }

    #[test]
    fn test_cost_accepts_numbers() {
        let breakdown = decode::<CostBreakdown>(r#"[{"name":"Fuel","cost":42.5},{"name":"?","cost":"n/a"}]"#);
        assert!(breakdown.is_ok());
        assert_eq!(breakdown.value.0[0].cost, "42.5");
        assert_eq!(breakdown.value.total(), 42.5);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,250.50"), Some(1250.5));
        assert_eq!(parse_amount(" 12 "), Some(12.0));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_equipment_ids_numbers() {
        let ids = decode::<EquipmentIds>("[\"EQ-1\", 7]").into_value();
        assert_eq!(ids.0, vec!["EQ-1", "7"]);
        assert!(ids.contains("7"));
    }

    #[test]
    fn test_staff_assignments() {
        let cell = r#"[{"id":"S-1","roles":["Lead"]},{"id":2}]"#;
        let mut staff = decode::<StaffAssignments>(cell).into_value();
        assert_eq!(staff.find("2").unwrap().roles.len(), 0);

        staff.assign("S-1", vec!["Lead".into(), "Driver".into()]);
        staff.assign("S-3", vec![]);
        assert!(staff.unassign("2"));
        assert_eq!(staff.0.len(), 2);

        let again = decode::<StaffAssignments>(&encode(&staff)).into_value();
        assert_eq!(again, staff);
    }

    #[test]
    fn test_subtasks_progress_and_toggle() {
        let mut subtasks = decode::<Subtasks>(
            r#"[{"name":"Measure","completed":true},{"name":"Cut"}]"#,
        )
        .into_value();
        assert_eq!(subtasks.progress(), (1, 2));
        assert!(subtasks.toggle(1));
        assert!(!subtasks.toggle(5));
        assert_eq!(subtasks.progress(), (2, 2));
    }

    #[test]
    fn test_task_buckets_preserve_order() {
        let cell = r#"{"To Do":["T-3","T-1"],"In Progress":[],"Done":["T-2"]}"#;
        let buckets = decode::<TaskBuckets>(cell).into_value();
        let names: Vec<&str> = buckets.bucket_names().collect();
        assert_eq!(names, vec!["To Do", "In Progress", "Done"]);
        assert_eq!(encode(&buckets), cell);
    }

    #[test]
    fn test_task_buckets_move() {
        let mut buckets = decode::<TaskBuckets>(r#"{"To Do":["T-1"],"Done":[]}"#).into_value();
        buckets.move_task("T-1", "Done");
        assert_eq!(buckets.bucket("To Do"), Some(&[][..]));
        assert_eq!(buckets.bucket_of("T-1"), Some("Done"));

        buckets.move_task("T-9", "Blocked");
        assert_eq!(buckets.bucket_names().last(), Some("Blocked"));
    }

    #[test]
    fn test_task_buckets_rejects_array() {
        let decoded = decode::<TaskBuckets>("[]");
        assert!(decoded.error.is_some());
        assert!(decoded.value.0.is_empty());
        assert_eq!(encode(&decoded.value), "{}");
    }

    #[test]
    fn test_task_links_roundtrip() {
        let links = TaskLinks(vec!["https://example.com/a".into()]);
        assert_eq!(decode::<TaskLinks>(&encode(&links)).value, links);
    }
}
