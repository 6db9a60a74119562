//! Reconstruction of typed transactions from filtered report rows.

use crate::model::builders::{BuildError, TxBuilder};
use crate::model::rows::ReportRow;
use crate::model::stats::Stats;
use crate::model::transactions::Transaction;
use crate::util::fifo::FIFO;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[error("Cannot reconstruct transaction {transaction_id}")]
pub struct ReconstructError {
    pub transaction_id: u64,
    #[source]
    pub source: BuildError,
}

/// Group rows by consecutive runs and build one transaction per group.
///
/// Rows are sorted by ascending transaction id first; Exante reports list the
/// rows of one transaction under consecutive ids.
pub fn reconstruct(
    stats: &mut Stats,
    rows: FIFO<ReportRow>,
) -> Result<FIFO<Transaction>, ReconstructError> {
    let mut rows: Vec<ReportRow> = rows.into_iter().collect();
    rows.sort_by_key(|row| row.transaction_id);

    let mut transactions = FIFO::new();
    let mut builder: Option<TxBuilder> = None;
    let mut last_id = 0;

    for row in rows {
        let row_id = row.transaction_id;
        last_id = row_id;
        let wrap = |source| ReconstructError {
            transaction_id: row_id,
            source,
        };

        let row = match builder.as_mut() {
            Some(b) => match b.offer(row).map_err(wrap)? {
                None => continue,
                Some(rejected) => {
                    let done = builder
                        .take()
                        .expect("checked by the match")
                        .finish()
                        .map_err(wrap)?;
                    emit(stats, &mut transactions, done);
                    rejected
                }
            },
            None => row,
        };

        let mut fresh = TxBuilder::for_row(&row).map_err(wrap)?;
        if let Some(rejected) = fresh.offer(row).map_err(wrap)? {
            // A fresh builder always takes its own leading row.
            return Err(wrap(BuildError::UnrecognizedShape(format!(
                "row rejected by a fresh builder: {rejected:?}"
            ))));
        }
        builder = Some(fresh);
    }

    if let Some(b) = builder {
        let done = b.finish().map_err(|source| ReconstructError {
            transaction_id: last_id,
            source,
        })?;
        emit(stats, &mut transactions, done);
    }

    Ok(transactions)
}

fn emit(stats: &mut Stats, transactions: &mut FIFO<Transaction>, tx: Transaction) {
    debug!("Reconstructed: {tx:?}");
    stats.inc_transactions();
    transactions.append_back(tx);
}
