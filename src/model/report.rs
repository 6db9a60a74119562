use crate::model::declaration::TaxDeclaration;
use crate::model::profit::TradeProfit;
use crate::quotes::{QuotedDividend, QuotedTax};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

/// Everything the pipeline produced for one fiscal year: taxable events
/// in PLN, the declaration totals, and the final wallet balances.
#[derive(Debug)]
pub struct TradingReport {
    pub trades: Vec<TradeProfit>,
    pub dividends: Vec<QuotedDividend>,
    pub taxes: Vec<QuotedTax>,
    pub declaration: TaxDeclaration,
    pub balances: BTreeMap<String, Decimal>,
}

impl fmt::Display for TradingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.trades.is_empty() {
            writeln!(f, "Matched trades:")?;
            for trade in &self.trades {
                let pair = &trade.source.source;
                writeln!(
                    f,
                    "  {} x{}: bought {} ({} {}, quoted {}), sold {} ({} {}, quoted {}), \
                     cost {} PLN, income {} PLN, profit {} PLN",
                    pair.buy.asset,
                    pair.amount_matched,
                    pair.buy.date.date(),
                    pair.buy.paid.amount,
                    pair.buy.paid.currency,
                    trade.source.buy_quotation_date,
                    pair.sell.date.date(),
                    pair.sell.received.amount,
                    pair.sell.received.currency,
                    trade.source.sell_quotation_date,
                    trade.paid_pln,
                    trade.received_pln,
                    trade.profit(),
                )?;
            }
            writeln!(f)?;
        }

        if !self.dividends.is_empty() {
            writeln!(f, "Dividends:")?;
            for div in &self.dividends {
                writeln!(
                    f,
                    "  {}: {} {} = {} PLN (withheld {} PLN, quoted {}) {}",
                    div.source.date.date(),
                    div.source.received.amount,
                    div.source.received.currency,
                    div.received_pln,
                    div.paid_tax_pln,
                    div.quotation_date,
                    div.source.comment,
                )?;
            }
            writeln!(f)?;
        }

        if !self.taxes.is_empty() {
            writeln!(f, "Taxes:")?;
            for tax in &self.taxes {
                writeln!(
                    f,
                    "  {}: {} {} = {} PLN (quoted {}) {}",
                    tax.source.date.date(),
                    tax.source.paid.amount,
                    tax.source.paid.currency,
                    tax.paid_pln,
                    tax.quotation_date,
                    tax.source.comment,
                )?;
            }
            writeln!(f)?;
        }

        writeln!(f, "{}", self.declaration)?;

        writeln!(f)?;
        writeln!(f, "Final balances:")?;
        for (asset, balance) in &self.balances {
            writeln!(f, "  {asset}: {balance}")?;
        }

        Ok(())
    }
}
