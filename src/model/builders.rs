//! Per-group accumulation of report rows into typed transactions.
//!
//! Rows arrive sorted by transaction id. A [`TxBuilder`] is started from the
//! first row of a group and offered each following row: it either absorbs the
//! row or hands it back, which signals that the group is complete and the next
//! one starts with the returned row.

use crate::model::rows::{InvalidRowError, OperationKind, ReportRow};
use crate::model::transactions::{
    is_currency, AutoConversion, BuyTx, DividendTx, Money, SellTx, Share, TaxTx, Transaction,
};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    InvalidRow(#[from] InvalidRowError),

    #[error("Rows do not form a known transaction shape: {0}")]
    UnrecognizedShape(String),

    #[error("A transaction group must not start with a {0} row")]
    BadLeadingRow(OperationKind),
}

fn shape(msg: impl Into<String>) -> BuildError {
    BuildError::UnrecognizedShape(msg.into())
}

fn row_is_money(row: &ReportRow) -> bool {
    is_currency(&row.asset)
}

/// One increase/decrease pair of AUTOCONVERSION rows.
#[derive(Debug, Default)]
struct AutoConvGroup {
    increase: Option<ReportRow>,
    decrease: Option<ReportRow>,
}

impl AutoConvGroup {
    fn is_complete(&self) -> bool {
        self.increase.is_some() && self.decrease.is_some()
    }

    fn build(self) -> Result<AutoConversion, BuildError> {
        let inc = self
            .increase
            .ok_or_else(|| shape("autoconversion without an increase row"))?;
        let dec = self
            .decrease
            .ok_or_else(|| shape("autoconversion without a decrease row"))?;

        Ok(AutoConversion {
            from: Money::new(-dec.sum, dec.asset),
            to: Money::new(inc.sum, inc.asset),
            date: dec.when,
            transaction_id: dec.transaction_id.min(inc.transaction_id),
        })
    }
}

/// Slot-based accumulator for the rows of one transaction group.
#[derive(Debug, Default)]
struct RowAccum {
    increase: Option<ReportRow>,
    decrease: Vec<ReportRow>,
    commission: Option<ReportRow>,
    autoconversions: Vec<AutoConvGroup>,
    // First row of the group names the whole transaction.
    transaction_id: Option<u64>,
}

impl RowAccum {
    fn add_row(&mut self, row: ReportRow) -> Result<(), BuildError> {
        if self.transaction_id.is_none() {
            self.transaction_id = Some(row.transaction_id);
        }

        match row.operation {
            OperationKind::Commission => {
                if !row_is_money(&row) {
                    return Err(InvalidRowError::NonMoneyCommission(row.asset).into());
                }
                if row.sum >= Decimal::ZERO {
                    return Err(InvalidRowError::NonNegativeCommission(row.sum).into());
                }
                self.commission = Some(row);
            }
            OperationKind::AutoConversion => self.push_autoconversion(row),
            _ if row.sum > Decimal::ZERO => self.increase = Some(row),
            _ => self.decrease.push(row),
        }

        Ok(())
    }

    fn push_autoconversion(&mut self, row: ReportRow) {
        if self.autoconversions.last().map_or(true, |g| g.is_complete()) {
            self.autoconversions.push(AutoConvGroup::default());
        }
        let group = self
            .autoconversions
            .last_mut()
            .expect("just pushed when empty");
        if row.sum > Decimal::ZERO {
            group.increase = Some(row);
        } else {
            group.decrease = Some(row);
        }
    }

    fn build_autoconversions(&mut self) -> Result<Vec<AutoConversion>, BuildError> {
        std::mem::take(&mut self.autoconversions)
            .into_iter()
            .map(AutoConvGroup::build)
            .collect()
    }

    fn group_id(&self) -> u64 {
        self.transaction_id.unwrap_or_default()
    }
}

/// Which transaction shape the current group is being accumulated into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BuilderKind {
    Trade,
    FundingWithdrawal,
    Tax,
    IssuanceFee,
    Fee,
    CorporateAction,
    StockSplit,
    Dividend,
    AutoConversion,
}

impl BuilderKind {
    fn for_leading(op: OperationKind) -> Result<Self, BuildError> {
        match op {
            OperationKind::Trade => Ok(Self::Trade),
            OperationKind::FundingWithdrawal => Ok(Self::FundingWithdrawal),
            OperationKind::Tax | OperationKind::UsTax => Ok(Self::Tax),
            OperationKind::IssuanceFee => Ok(Self::IssuanceFee),
            OperationKind::Fee => Ok(Self::Fee),
            OperationKind::CorporateAction => Ok(Self::CorporateAction),
            OperationKind::StockSplit => Ok(Self::StockSplit),
            OperationKind::Dividend => Ok(Self::Dividend),
            OperationKind::AutoConversion => Ok(Self::AutoConversion),
            OperationKind::Commission => Err(BuildError::BadLeadingRow(op)),
        }
    }

    fn accepts(&self, op: OperationKind) -> bool {
        match self {
            Self::Trade => matches!(
                op,
                OperationKind::Trade | OperationKind::Commission | OperationKind::AutoConversion
            ),
            Self::FundingWithdrawal => matches!(op, OperationKind::FundingWithdrawal),
            Self::Tax => matches!(op, OperationKind::Tax | OperationKind::UsTax),
            Self::IssuanceFee => matches!(op, OperationKind::IssuanceFee),
            Self::Fee => matches!(op, OperationKind::Fee),
            Self::CorporateAction => matches!(op, OperationKind::CorporateAction),
            Self::StockSplit => matches!(op, OperationKind::StockSplit),
            Self::Dividend => matches!(
                op,
                OperationKind::Dividend
                    | OperationKind::AutoConversion
                    | OperationKind::Tax
                    | OperationKind::UsTax
                    | OperationKind::IssuanceFee
            ),
            Self::AutoConversion => matches!(op, OperationKind::AutoConversion),
        }
    }
}

pub(crate) struct TxBuilder {
    kind: BuilderKind,
    accum: RowAccum,
    // Trade groups chain rows via UUID: the trade row carries a uuid, its
    // autoconversions reference it through their parent uuid.
    uuids: Vec<String>,
    symbol: Option<String>,
}

impl TxBuilder {
    pub(crate) fn for_row(row: &ReportRow) -> Result<Self, BuildError> {
        Ok(Self {
            kind: BuilderKind::for_leading(row.operation)?,
            accum: RowAccum::default(),
            uuids: Vec::new(),
            symbol: None,
        })
    }

    /// Offer a row to the current group. Returns the row back when the group
    /// refuses it, meaning the accumulation is complete.
    pub(crate) fn offer(&mut self, row: ReportRow) -> Result<Option<ReportRow>, BuildError> {
        if !self.continues(&row) || !self.kind.accepts(row.operation) || self.slot_full(&row) {
            return Ok(Some(row));
        }

        if self.symbol.is_none() {
            self.symbol = Some(row.symbol_id.clone());
        }
        if self.kind == BuilderKind::Trade && !row.uuid.is_empty() {
            self.uuids.push(row.uuid.clone());
        }
        self.accum.add_row(row)?;

        Ok(None)
    }

    fn continues(&self, row: &ReportRow) -> bool {
        match self.kind {
            // Corporate actions rename the symbol mid-group.
            BuilderKind::CorporateAction => true,
            // Funding, dividend and split groups close on their full slots.
            BuilderKind::FundingWithdrawal | BuilderKind::Dividend | BuilderKind::StockSplit => {
                true
            }
            BuilderKind::Trade => {
                (!row.parent_uuid.is_empty() && self.uuids.contains(&row.parent_uuid))
                    || self.symbol_matches(row)
            }
            _ => self.symbol_matches(row),
        }
    }

    fn symbol_matches(&self, row: &ReportRow) -> bool {
        self.symbol.as_deref().map_or(true, |s| s == row.symbol_id)
    }

    /// Would this row land in a slot the variant has already filled?
    fn slot_full(&self, row: &ReportRow) -> bool {
        let accum = &self.accum;

        // A funding or withdrawal is always a single row; any second row of
        // either sign starts the next group.
        if self.kind == BuilderKind::FundingWithdrawal {
            return accum.increase.is_some() || !accum.decrease.is_empty();
        }

        match row.operation {
            OperationKind::Commission => accum.commission.is_some(),
            OperationKind::AutoConversion => match self.kind {
                // A money-for-money exchange cannot carry autoconversions.
                BuilderKind::Trade => {
                    accum.increase.as_ref().is_some_and(row_is_money)
                        && accum.decrease.first().is_some_and(row_is_money)
                }
                BuilderKind::AutoConversion => {
                    accum.autoconversions.first().is_some_and(|g| g.is_complete())
                }
                _ => false,
            },
            _ if row.sum > Decimal::ZERO => accum.increase.is_some(),
            _ => match self.kind {
                // Dividends may collect a tax and an issuance fee, but only
                // one decrease of the DIVIDEND kind itself.
                BuilderKind::Dividend => {
                    row.operation == OperationKind::Dividend && accum.decrease.len() == 1
                }
                _ => accum.decrease.len() == 1,
            },
        }
    }

    pub(crate) fn finish(mut self) -> Result<Transaction, BuildError> {
        match self.kind {
            BuilderKind::Trade => self.finish_trade(),
            BuilderKind::FundingWithdrawal => self.finish_funding_withdrawal(),
            BuilderKind::Tax => self.finish_tax(),
            BuilderKind::IssuanceFee => self.finish_money_decrease("issuance fee", |paid, row| {
                Transaction::IssuanceFee {
                    paid,
                    date: row.when,
                    transaction_id: row.transaction_id,
                }
            }),
            BuilderKind::Fee => self.finish_money_decrease("fee", |paid, row| Transaction::Fee {
                paid,
                date: row.when,
                transaction_id: row.transaction_id,
            }),
            BuilderKind::CorporateAction => {
                let (from_share, to_share, dec) = self.take_share_exchange("corporate action")?;
                Ok(Transaction::CorporateAction {
                    from_share,
                    to_share,
                    date: dec.when,
                    transaction_id: self.accum.group_id(),
                })
            }
            BuilderKind::StockSplit => {
                let (from_share, to_share, dec) = self.take_share_exchange("stock split")?;
                Ok(Transaction::StockSplit {
                    from_share,
                    to_share,
                    date: dec.when,
                    transaction_id: self.accum.group_id(),
                })
            }
            BuilderKind::Dividend => self.finish_dividend(),
            BuilderKind::AutoConversion => self.finish_autoconversion(),
        }
    }

    fn finish_trade(mut self) -> Result<Transaction, BuildError> {
        let transaction_id = self.accum.group_id();
        let autoconversions = self.accum.build_autoconversions()?;

        let inc = self
            .accum
            .increase
            .take()
            .ok_or_else(|| shape("trade without an increase row"))?;
        if self.accum.decrease.len() != 1 {
            return Err(shape(format!(
                "trade with {} decrease rows, expected exactly 1",
                self.accum.decrease.len()
            )));
        }
        let dec = self.accum.decrease.remove(0);
        let commission = self.accum.commission.take();

        match (row_is_money(&inc), row_is_money(&dec)) {
            // Money for money: a currency exchange.
            (true, true) => {
                if let Some(commission) = commission {
                    return Err(shape(format!(
                        "unexpected commission for a money exchange: {commission:?}"
                    )));
                }
                Ok(Transaction::Exchange {
                    from: Money::new(-dec.sum, dec.asset),
                    to: Money::new(inc.sum, inc.asset),
                    date: dec.when,
                    transaction_id,
                })
            }
            // Shares in, money out: a buy.
            (false, true) => {
                let commission = match commission {
                    Some(c) => Money::new(-c.sum, c.asset),
                    None => Money::zero(dec.asset.clone()),
                };
                Ok(Transaction::Buy(BuyTx {
                    asset: inc.asset,
                    quantity: inc.sum,
                    paid: Money::new(-dec.sum, dec.asset),
                    commission,
                    autoconversions,
                    date: inc.when,
                    transaction_id,
                }))
            }
            // Money in, shares out: a sell.
            (true, false) => {
                let commission = match commission {
                    Some(c) => Money::new(-c.sum, c.asset),
                    None => Money::zero(inc.asset.clone()),
                };
                Ok(Transaction::Sell(SellTx {
                    asset: dec.asset,
                    quantity: -dec.sum,
                    received: Money::new(inc.sum, inc.asset),
                    commission,
                    autoconversions,
                    date: dec.when,
                    transaction_id,
                }))
            }
            (false, false) => Err(shape(format!(
                "barter trade, neither side is money: {} for {}",
                inc.asset, dec.asset
            ))),
        }
    }

    fn finish_funding_withdrawal(mut self) -> Result<Transaction, BuildError> {
        if let Some(commission) = self.accum.commission {
            return Err(shape(format!(
                "unexpected commission for funding/withdrawal: {commission:?}"
            )));
        }

        match (self.accum.increase.take(), self.accum.decrease.len()) {
            (Some(inc), 0) if row_is_money(&inc) => Ok(Transaction::Funding {
                amount: Money::new(inc.sum, inc.asset),
                date: inc.when,
                transaction_id: self.accum.group_id(),
            }),
            (None, 1) => {
                let dec = self.accum.decrease.remove(0);
                if !row_is_money(&dec) {
                    return Err(shape(format!("withdrawal of non-money: {}", dec.asset)));
                }
                Ok(Transaction::Withdrawal {
                    amount: Money::new(-dec.sum, dec.asset),
                    date: dec.when,
                    transaction_id: self.accum.group_id(),
                })
            }
            (inc, n_dec) => Err(shape(format!(
                "funding/withdrawal must be a single money row, got increase {inc:?} and {n_dec} decreases"
            ))),
        }
    }

    fn finish_tax(mut self) -> Result<Transaction, BuildError> {
        match (self.accum.increase.take(), self.accum.decrease.len()) {
            (None, 1) => {
                let dec = self.accum.decrease.remove(0);
                if !row_is_money(&dec) {
                    return Err(shape(format!("tax paid in non-money: {}", dec.asset)));
                }
                Ok(Transaction::Tax(TaxTx {
                    paid: Money::new(-dec.sum, dec.asset),
                    date: dec.when,
                    transaction_id: self.accum.group_id(),
                    comment: dec.comment,
                }))
            }
            (Some(_), 0) => Err(shape("tax recalculation (refund) is not supported")),
            (inc, n_dec) => Err(shape(format!(
                "tax must be a single money decrease, got increase {inc:?} and {n_dec} decreases"
            ))),
        }
    }

    fn finish_money_decrease(
        &mut self,
        what: &str,
        make: impl FnOnce(Money, &ReportRow) -> Transaction,
    ) -> Result<Transaction, BuildError> {
        if self.accum.increase.is_some() || self.accum.decrease.len() != 1 {
            return Err(shape(format!("{what} must be a single money decrease")));
        }
        let dec = self.accum.decrease.remove(0);
        if !row_is_money(&dec) {
            return Err(shape(format!("{what} paid in non-money: {}", dec.asset)));
        }
        Ok(make(Money::new(-dec.sum, dec.asset.clone()), &dec))
    }

    fn take_share_exchange(&mut self, what: &str) -> Result<(Share, Share, ReportRow), BuildError> {
        let inc = self
            .accum
            .increase
            .take()
            .ok_or_else(|| shape(format!("{what} without an increase row")))?;
        if self.accum.decrease.len() != 1 {
            return Err(shape(format!(
                "{what} with {} decrease rows, expected exactly 1",
                self.accum.decrease.len()
            )));
        }
        let dec = self.accum.decrease.remove(0);

        let from_share = Share::new(-dec.sum, dec.asset.clone());
        let to_share = Share::new(inc.sum, inc.asset);
        Ok((from_share, to_share, dec))
    }

    fn finish_dividend(mut self) -> Result<Transaction, BuildError> {
        let transaction_id = self.accum.group_id();
        let autoconversions = self.accum.build_autoconversions()?;

        let inc = self
            .accum
            .increase
            .take()
            .ok_or_else(|| shape("dividend without an increase row"))?;
        if self.accum.decrease.len() > 2 {
            return Err(shape(format!(
                "dividend can lose money to at most a tax and an issuance fee, got {} decreases",
                self.accum.decrease.len()
            )));
        }

        let mut paid_tax = None;
        let mut issuance_fee = None;
        for dec in self.accum.decrease.drain(..) {
            let slot = match dec.operation {
                OperationKind::Tax | OperationKind::UsTax => &mut paid_tax,
                OperationKind::IssuanceFee => &mut issuance_fee,
                op => {
                    return Err(shape(format!(
                        "dividend decrease must be a tax or issuance fee, got {op}"
                    )))
                }
            };
            if slot.is_some() {
                return Err(shape("dividend with a duplicated tax or issuance fee row"));
            }
            *slot = Some(Money::new(-dec.sum, dec.asset));
        }

        Ok(Transaction::Dividend(DividendTx {
            received: Money::new(inc.sum, inc.asset),
            paid_tax,
            issuance_fee,
            autoconversions,
            date: inc.when,
            transaction_id,
            comment: inc.comment,
        }))
    }

    fn finish_autoconversion(mut self) -> Result<Transaction, BuildError> {
        if let Some(commission) = self.accum.commission {
            return Err(shape(format!(
                "unexpected commission for autoconversion: {commission:?}"
            )));
        }
        if self.accum.autoconversions.len() != 1 {
            return Err(shape(format!(
                "standalone autoconversion must be a single increase/decrease pair, got {} pairs",
                self.accum.autoconversions.len()
            )));
        }

        let conv = self.accum.autoconversions.remove(0).build()?;
        Ok(Transaction::AutoConversion(AutoConversion {
            transaction_id: self.accum.group_id(),
            ..conv
        }))
    }
}
