//! End-to-end processing of reconstructed transactions.

use crate::model::declaration::DeclarationCalculator;
use crate::model::matcher::{FifoMatcher, MatchError};
use crate::model::profit::TradeProfit;
use crate::model::report::TradingReport;
use crate::model::stats::Stats;
use crate::model::transactions::{DividendTx, TaxTx, Transaction};
use crate::model::wallet::{InsufficientAssetError, Wallet};
use crate::quotes::{QuoteError, QuotesProvider, WorkingDayBeforeQuoter};
use crate::util::fifo::FIFO;
use chrono::Datelike;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TraderError {
    #[error("Transaction {transaction_id} cannot be funded")]
    Wallet {
        transaction_id: u64,
        #[source]
        source: InsufficientAssetError,
    },

    #[error("Transaction {transaction_id} cannot be matched")]
    Match {
        transaction_id: u64,
        #[source]
        source: MatchError,
    },

    #[error("Cannot value transaction in PLN")]
    Quote(#[from] QuoteError),
}

pub struct Trader<P> {
    quoter: WorkingDayBeforeQuoter<P>,
    calculator: DeclarationCalculator,
    tax_year: Option<i32>,
    wallet: Wallet,
}

impl<P: QuotesProvider> Trader<P> {
    pub fn new(provider: P, tax_percentage: Decimal, tax_year: Option<i32>) -> Self {
        Self {
            quoter: WorkingDayBeforeQuoter::new(provider),
            calculator: DeclarationCalculator::new(tax_percentage),
            tax_year,
            wallet: Wallet::new(),
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Run every transaction through the wallet and the FIFO matcher, then
    /// value the fiscal year's taxable events in PLN and total them up.
    pub fn process(
        &mut self,
        stats: &mut Stats,
        transactions: FIFO<Transaction>,
    ) -> Result<TradingReport, TraderError> {
        let mut transactions: Vec<_> = transactions.into_iter().collect();
        // Reports may be concatenated out of order; ids break date ties.
        transactions.sort_by_key(|tx| (tx.date(), tx.transaction_id()));

        let mut matcher = FifoMatcher::new();
        let mut dividends: Vec<DividendTx> = Vec::new();
        let mut taxes: Vec<TaxTx> = Vec::new();

        for tx in transactions {
            debug!("Processing {tx:?}");
            let transaction_id = tx.transaction_id();

            self.wallet
                .apply(&tx)
                .map_err(|source| TraderError::Wallet {
                    transaction_id,
                    source,
                })?;

            match tx {
                Transaction::Buy(buy) => matcher.buy(&buy),
                Transaction::Sell(sell) => {
                    matcher
                        .sell(&sell)
                        .map_err(|source| TraderError::Match {
                            transaction_id,
                            source,
                        })?;
                }
                Transaction::CorporateAction {
                    from_share,
                    to_share,
                    ..
                } => matcher.corporate_action(&from_share, &to_share),
                Transaction::StockSplit {
                    from_share,
                    to_share,
                    ..
                } => {
                    matcher
                        .stock_split(&from_share, &to_share)
                        .map_err(|source| TraderError::Match {
                            transaction_id,
                            source,
                        })?;
                }
                Transaction::Dividend(div) => dividends.push(div),
                Transaction::Tax(tax) => taxes.push(tax),
                _ => (),
            }
        }

        // A pair belongs to the year its sell leg settles in; the buy leg
        // may be years earlier.
        let in_year = |year: i32| self.tax_year.is_none_or(|tax_year| year == tax_year);

        let mut trades = Vec::new();
        for pair in matcher.into_pairs() {
            if !in_year(pair.sell.date.year()) {
                continue;
            }
            let quoted = self.quoter.quote_pair(pair)?;
            trades.push(TradeProfit::from_quoted(quoted));
        }
        stats.set_matched_pairs(trades.len());

        let mut quoted_dividends = Vec::new();
        for div in dividends {
            if !in_year(div.date.year()) {
                continue;
            }
            quoted_dividends.push(self.quoter.quote_dividend(div)?);
        }

        let mut quoted_taxes = Vec::new();
        for tax in taxes {
            if !in_year(tax.date.year()) {
                continue;
            }
            quoted_taxes.push(self.quoter.quote_tax(tax)?);
        }

        let declaration = self
            .calculator
            .calculate(&trades, &quoted_dividends, &quoted_taxes);

        Ok(TradingReport {
            trades,
            dividends: quoted_dividends,
            taxes: quoted_taxes,
            declaration,
            balances: self.wallet.assets().clone().into_iter().collect(),
        })
    }
}
