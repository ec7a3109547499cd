//! 集計（ダッシュボードのKPI）

use crate::codec::{decode, CostBreakdown};
use crate::projection::group_by_column;
use crate::store::TabularStore;
use serde::Serialize;

/// 1シート分の集計結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub sheet: String,
    pub records: usize,
    /// ステータス別件数（出現順）
    pub status_counts: Vec<(String, usize)>,
    /// 費用内訳の合計
    pub cost_total: f64,
    /// 費用内訳をデコードできなかった行数
    pub decode_failures: usize,
}

/// ステータス別件数と費用合計を集計する
///
/// `cost_column`が`None`または存在しない列なら費用は0。
pub fn summarize(
    store: &TabularStore,
    status_column: &str,
    default_status: &str,
    cost_column: Option<&str>,
) -> Summary {
    let status_counts = group_by_column(store.records(), status_column, default_status)
        .into_iter()
        .map(|(status, records)| (status, records.len()))
        .collect();

    let mut cost_total = 0.0;
    let mut decode_failures = 0;
    if let Some(column) = cost_column.filter(|c| store.index_of(c).is_some()) {
        for record in store.records() {
            let decoded = decode::<CostBreakdown>(record.value(column));
            if !decoded.is_ok() {
                decode_failures += 1;
            }
            cost_total += decoded.value.total();
        }
    }

    Summary {
        sheet: store.name().to_string(),
        records: store.len(),
        status_counts,
        cost_total,
        decode_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projects() -> TabularStore {
        let rows: &[&[&str]] = &[
            &["ProjectID", "Status", "Cost Breakdown"],
            &["P-1", "Active", r#"[{"name":"Rental","cost":"150"},{"name":"Tax","cost":"12"}]"#],
            &["P-2", "", "broken"],
            &["P-3", "Active", ""],
            &["P-4", "Done", r#"[{"name":"Crew","cost":"$1,000"}]"#],
        ];
        TabularStore::from_values(
            "Projects",
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&projects(), "Status", "Planning", Some("Cost Breakdown"));
        assert_eq!(summary.sheet, "Projects");
        assert_eq!(summary.records, 4);
        assert_eq!(
            summary.status_counts,
            vec![
                ("Active".to_string(), 2),
                ("Planning".to_string(), 1),
                ("Done".to_string(), 1)
            ]
        );
        assert_eq!(summary.cost_total, 1162.0);
        assert_eq!(summary.decode_failures, 1);
    }

    #[test]
    fn test_summarize_without_cost_column() {
        let summary = summarize(&projects(), "Status", "Planning", Some("Missing"));
        assert_eq!(summary.cost_total, 0.0);
        assert_eq!(summary.decode_failures, 0);
    }

    #[test]
    fn test_summarize_empty_store() {
        let summary = summarize(&TabularStore::empty("Clients"), "Status", "New", None);
        assert_eq!(summary.records, 0);
        assert!(summary.status_counts.is_empty());
    }
}
