//! Filtering of rolled-back transactions.
//!
//! A rollback announces itself through a row whose comment back-references the
//! cancelled transaction with a `#<id>` marker. Both the referenced
//! transaction and the announcing row are dropped before reconstruction.

use crate::model::rows::ReportRow;
use crate::model::stats::Stats;
use crate::util::fifo::FIFO;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn backref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#(\d+)").expect("pattern is valid"))
}

/// Drop all rows belonging to rolled-back transactions.
///
/// A comment with more than one back-reference is only reported; its rows are
/// left in place. Known gap: the intent of multi-reference comments is
/// unclear, so they are deliberately not acted upon.
pub fn filter_rollbacked(stats: &mut Stats, rows: FIFO<ReportRow>) -> FIFO<ReportRow> {
    let mut cancelled: HashSet<u64> = HashSet::new();

    for row in rows.iter() {
        let ids: Vec<u64> = backref_pattern()
            .captures_iter(&row.comment)
            .filter_map(|caps| caps[1].parse().ok())
            .collect();

        match ids[..] {
            [] => {}
            [referenced] => {
                debug!(
                    "Transaction {} rolls back transaction {referenced}",
                    row.transaction_id
                );
                cancelled.insert(referenced);
                cancelled.insert(row.transaction_id);
            }
            _ => warn!(
                "Transaction {} has multiple rollback back-references in comment {:?}; leaving its rows in place",
                row.transaction_id, row.comment
            ),
        }
    }

    let mut kept = FIFO::new();
    for row in rows {
        if cancelled.contains(&row.transaction_id) {
            stats.inc_rollbacked();
        } else {
            kept.append_back(row);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rows::tests::csv_row;
    use crate::model::rows::report_row_parse;
    use tracing_test::traced_test;

    fn row_with_comment(id: &str, comment: &str) -> ReportRow {
        let mut raw = csv_row(id, "None", "FUNDING/WITHDRAWAL", "2020-10-20 20:40:55", "10", "EUR");
        raw.comment = comment.to_string();
        report_row_parse(raw).unwrap()
    }

    fn ids(rows: &FIFO<ReportRow>) -> Vec<u64> {
        rows.iter().map(|r| r.transaction_id).collect()
    }

    #[test]
    fn keeps_unrelated_rows() {
        let mut stats = Stats::default();
        let rows = [
            row_with_comment("1", "None"),
            row_with_comment("2", "dividend 1.26 USD per share"),
        ]
        .into_iter()
        .collect();

        let kept = filter_rollbacked(&mut stats, rows);

        assert_eq!(ids(&kept), vec![1, 2]);
    }

    #[test]
    fn removes_referenced_and_referencing_rows() {
        let mut stats = Stats::default();
        let rows = [
            row_with_comment("1", "None"),
            row_with_comment("2", "None"),
            row_with_comment("3", "Rollback for transaction #2"),
        ]
        .into_iter()
        .collect();

        let kept = filter_rollbacked(&mut stats, rows);

        assert_eq!(ids(&kept), vec![1]);
    }

    #[test]
    #[traced_test]
    fn multiple_backrefs_are_reported_but_kept() {
        let _ = tracing_log::LogTracer::init();

        let mut stats = Stats::default();
        let rows = [
            row_with_comment("1", "None"),
            row_with_comment("2", "Rollback for #1 and #3"),
            row_with_comment("3", "None"),
        ]
        .into_iter()
        .collect();

        let kept = filter_rollbacked(&mut stats, rows);

        assert_eq!(ids(&kept), vec![1, 2, 3]);
        assert!(logs_contain("multiple rollback back-references"));
    }

    #[test]
    fn rollback_of_a_whole_group_drops_every_row() {
        let mut stats = Stats::default();
        let rows = [
            row_with_comment("5", "None"),
            row_with_comment("5", "None"),
            row_with_comment("6", "Rollback #5"),
        ]
        .into_iter()
        .collect();

        let kept = filter_rollbacked(&mut stats, rows);

        assert!(kept.is_empty());
    }
}
