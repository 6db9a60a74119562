//! Reader for the Exante "Transaction Report" TSV export.
//!
//! The export is tab-separated with every field double-quoted. Rows of one
//! logical transaction carry consecutive transaction ids, which the
//! reconstruction stage relies on.

use crate::model::rows::{report_row_parse, InvalidRowError, ReportRow};
use crate::model::stats::Stats;
use crate::util::fifo::FIFO;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const EXPECTED_COLUMNS: [&str; 11] = [
    "Transaction ID",
    "Account ID",
    "Symbol ID",
    "Operation type",
    "When",
    "Sum",
    "Asset",
    "EUR equivalent",
    "Comment",
    "UUID",
    "Parent UUID",
];

#[derive(Debug, Error)]
pub enum ExanteError {
    #[error("File I/O error")]
    Fs(#[from] std::io::Error),

    #[error("CSV parser error")]
    Csv(#[from] csv::Error),

    #[error("Not an Exante transaction report; missing columns: {0:?}")]
    CorruptedReport(Vec<String>),

    #[error("Invalid report row {row}")]
    Row {
        row: usize,
        #[source]
        source: InvalidRowError,
    },
}

/// Raw row as it appears in the export, before validation.
#[derive(Debug, Deserialize)]
pub(crate) struct ReportCSVRow {
    #[serde(rename = "Transaction ID")]
    pub(crate) transaction_id: String,

    #[serde(rename = "Account ID")]
    pub(crate) account_id: String,

    #[serde(rename = "Symbol ID")]
    pub(crate) symbol_id: String,

    #[serde(rename = "Operation type")]
    pub(crate) operation_type: String,

    #[serde(rename = "When")]
    pub(crate) when: String,

    #[serde(rename = "Sum")]
    pub(crate) sum: String,

    #[serde(rename = "Asset")]
    pub(crate) asset: String,

    #[serde(rename = "EUR equivalent")]
    pub(crate) eur_equivalent: String,

    #[serde(rename = "Comment")]
    pub(crate) comment: String,

    #[serde(rename = "UUID")]
    pub(crate) uuid: String,

    #[serde(rename = "Parent UUID")]
    pub(crate) parent_uuid: String,
}

pub fn read_report(stats: &mut Stats, path: &Path) -> Result<FIFO<ReportRow>, ExanteError> {
    parse_report(stats, File::open(path)?)
}

pub fn parse_report<R: Read>(stats: &mut Stats, reader: R) -> Result<FIFO<ReportRow>, ExanteError> {
    let mut csv = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(reader);

    let headers = csv.headers()?;
    let missing: Vec<String> = EXPECTED_COLUMNS
        .iter()
        .filter(|expected| !headers.iter().any(|header| header == **expected))
        .map(|expected| expected.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ExanteError::CorruptedReport(missing));
    }

    let mut rows = FIFO::new();
    for (index, result) in csv.deserialize().enumerate() {
        let raw: ReportCSVRow = result?;

        // 1-based, counting the header line.
        let row_number = index + 2;
        let row = report_row_parse(raw).map_err(|source| ExanteError::Row {
            row: row_number,
            source,
        })?;

        debug!("Read {row:?}");
        stats.inc_report_row();
        rows.append_back(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rows::OperationKind;

    const HEADER: &str = "\"Transaction ID\"\t\"Account ID\"\t\"Symbol ID\"\t\"Operation type\"\t\"When\"\t\"Sum\"\t\"Asset\"\t\"EUR equivalent\"\t\"Comment\"\t\"UUID\"\t\"Parent UUID\"";

    fn report(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn parses_a_funding_row() {
        let mut stats = Stats::default();
        let text = report(&[
            "\"1000\"\t\"TBA9999.001\"\t\"None\"\t\"FUNDING/WITHDRAWAL\"\t\"2020-10-20 20:40:55\"\t\"1000.0\"\t\"EUR\"\t\"1000.0\"\t\"None\"\t\"\"\t\"\"",
        ]);

        let rows = parse_report(&mut stats, text.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        let row = rows.peek_front().unwrap();
        assert_eq!(row.transaction_id, 1000);
        assert_eq!(row.operation, OperationKind::FundingWithdrawal);
        assert_eq!(row.sum, "1000.0".parse().unwrap());
        assert_eq!(row.asset, "EUR");
    }

    #[test]
    fn parses_a_trade_with_uuid_columns() {
        let mut stats = Stats::default();
        let text = report(&[
            "\"1001\"\t\"TBA9999.001\"\t\"PHYS.ARCA\"\t\"TRADE\"\t\"2020-10-21 20:40:55\"\t\"100\"\t\"PHYS.ARCA\"\t\"1230.0\"\t\"None\"\t\"aaaa-bbbb\"\t\"cccc-dddd\"",
        ]);

        let rows = parse_report(&mut stats, text.as_bytes()).unwrap();

        let row = rows.peek_front().unwrap();
        assert_eq!(row.uuid, "aaaa-bbbb");
        assert_eq!(row.parent_uuid, "cccc-dddd");
    }

    #[test]
    fn preserves_row_order() {
        let mut stats = Stats::default();
        let text = report(&[
            "\"2\"\t\"TBA9999.001\"\t\"None\"\t\"FUNDING/WITHDRAWAL\"\t\"2020-10-20 20:40:55\"\t\"1000.0\"\t\"EUR\"\t\"1000.0\"\t\"None\"\t\"\"\t\"\"",
            "\"1\"\t\"TBA9999.001\"\t\"None\"\t\"FUNDING/WITHDRAWAL\"\t\"2020-10-19 20:40:55\"\t\"500.0\"\t\"EUR\"\t\"500.0\"\t\"None\"\t\"\"\t\"\"",
        ]);

        let rows = parse_report(&mut stats, text.as_bytes()).unwrap();

        let ids: Vec<u64> = rows.into_iter().map(|row| row.transaction_id).collect();
        assert_eq!(ids, [2, 1]);
    }

    #[test]
    fn missing_columns_are_reported() {
        let mut stats = Stats::default();
        let text = "\"Transaction ID\"\t\"Account ID\"\t\"Symbol ID\"";

        let err = parse_report(&mut stats, text.as_bytes()).unwrap_err();

        match err {
            ExanteError::CorruptedReport(missing) => {
                assert!(missing.contains(&"Operation type".to_string()));
                assert!(missing.contains(&"Parent UUID".to_string()));
                assert_eq!(missing.len(), 8);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_rows_carry_their_line_number() {
        let mut stats = Stats::default();
        let text = report(&[
            "\"1\"\t\"TBA9999.001\"\t\"None\"\t\"FUNDING/WITHDRAWAL\"\t\"2020-10-20 20:40:55\"\t\"1000.0\"\t\"EUR\"\t\"1000.0\"\t\"None\"\t\"\"\t\"\"",
            "\"2\"\t\"TBA9999.001\"\t\"None\"\t\"TELEPORT\"\t\"2020-10-20 20:40:55\"\t\"1000.0\"\t\"EUR\"\t\"1000.0\"\t\"None\"\t\"\"\t\"\"",
        ]);

        let err = parse_report(&mut stats, text.as_bytes()).unwrap_err();

        match err {
            ExanteError::Row { row, source } => {
                assert_eq!(row, 3);
                assert_eq!(
                    source,
                    InvalidRowError::UnknownOperation("TELEPORT".to_string())
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn older_export_without_uuid_columns_is_rejected() {
        let mut stats = Stats::default();
        let text = "\"Transaction ID\"\t\"Account ID\"\t\"Symbol ID\"\t\"Operation type\"\t\"When\"\t\"Sum\"\t\"Asset\"\t\"EUR equivalent\"\t\"Comment\"\n\
                    \"1\"\t\"TBA9999.001\"\t\"None\"\t\"FUNDING/WITHDRAWAL\"\t\"2020-10-20 20:40:55\"\t\"1000.0\"\t\"EUR\"\t\"1000.0\"\t\"None\"";

        let err = parse_report(&mut stats, text.as_bytes()).unwrap_err();

        match err {
            ExanteError::CorruptedReport(missing) => {
                assert_eq!(missing, ["UUID", "Parent UUID"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
