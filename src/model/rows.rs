//! Validated rows of the Exante "Transaction Report" export.

use crate::imports::exante::ReportCSVRow;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;

pub(crate) const WHEN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
pub enum InvalidRowError {
    #[error("`{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("Invalid transaction id: `{0}`")]
    TransactionId(String),

    #[error("Unknown operation type: `{0}`")]
    UnknownOperation(String),

    #[error("Invalid timestamp: `{0}`")]
    Timestamp(String),

    #[error("Invalid decimal in `{field}`: `{value}`")]
    BadDecimal { field: &'static str, value: String },

    #[error("Sum must not be zero")]
    ZeroSum,

    #[error("Commission must be paid in a currency, got `{0}`")]
    NonMoneyCommission(String),

    #[error("Commission must be negative, got {0}")]
    NonNegativeCommission(Decimal),
}

/// The closed set of operation types appearing in Exante transaction reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationKind {
    Trade,
    Commission,
    FundingWithdrawal,
    AutoConversion,
    Dividend,
    Tax,
    UsTax,
    IssuanceFee,
    Fee,
    CorporateAction,
    StockSplit,
}

impl FromStr for OperationKind {
    type Err = InvalidRowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRADE" => Ok(Self::Trade),
            "COMMISSION" => Ok(Self::Commission),
            "FUNDING/WITHDRAWAL" => Ok(Self::FundingWithdrawal),
            "AUTOCONVERSION" => Ok(Self::AutoConversion),
            "DIVIDEND" => Ok(Self::Dividend),
            "TAX" => Ok(Self::Tax),
            "US TAX" => Ok(Self::UsTax),
            // "ISSUANSE" is Exante's own spelling.
            "ISSUANSE FEE" => Ok(Self::IssuanceFee),
            "FEE" => Ok(Self::Fee),
            "CORPORATE ACTION" => Ok(Self::CorporateAction),
            "STOCK SPLIT" => Ok(Self::StockSplit),
            _ => Err(InvalidRowError::UnknownOperation(s.to_string())),
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trade => "TRADE",
            Self::Commission => "COMMISSION",
            Self::FundingWithdrawal => "FUNDING/WITHDRAWAL",
            Self::AutoConversion => "AUTOCONVERSION",
            Self::Dividend => "DIVIDEND",
            Self::Tax => "TAX",
            Self::UsTax => "US TAX",
            Self::IssuanceFee => "ISSUANSE FEE",
            Self::Fee => "FEE",
            Self::CorporateAction => "CORPORATE ACTION",
            Self::StockSplit => "STOCK SPLIT",
        };
        f.write_str(name)
    }
}

/// One validated report row. Sign conventions are Exante's: `sum` is negative
/// for outflows and positive for inflows.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub transaction_id: u64,
    pub account_id: String,
    pub symbol_id: String,
    pub operation: OperationKind,
    pub when: NaiveDateTime,
    pub sum: Decimal,
    pub asset: String,
    pub eur_equivalent: Decimal,
    pub comment: String,
    pub uuid: String,
    pub parent_uuid: String,
}

pub(crate) fn report_row_parse(r: ReportCSVRow) -> Result<ReportRow, InvalidRowError> {
    let transaction_id = r
        .transaction_id
        .parse::<u64>()
        .map_err(|_| InvalidRowError::TransactionId(r.transaction_id.clone()))?;

    if r.account_id.is_empty() {
        return Err(InvalidRowError::EmptyField("Account ID"));
    }
    if r.symbol_id.is_empty() {
        return Err(InvalidRowError::EmptyField("Symbol ID"));
    }
    if r.asset.is_empty() {
        return Err(InvalidRowError::EmptyField("Asset"));
    }

    let operation = r.operation_type.parse()?;
    let when = NaiveDateTime::parse_from_str(&r.when, WHEN_FORMAT)
        .map_err(|_| InvalidRowError::Timestamp(r.when.clone()))?;

    let sum = Decimal::from_str(&r.sum).map_err(|_| InvalidRowError::BadDecimal {
        field: "Sum",
        value: r.sum.clone(),
    })?;
    if sum.is_zero() {
        return Err(InvalidRowError::ZeroSum);
    }

    let eur_equivalent =
        Decimal::from_str(&r.eur_equivalent).map_err(|_| InvalidRowError::BadDecimal {
            field: "EUR equivalent",
            value: r.eur_equivalent.clone(),
        })?;

    Ok(ReportRow {
        transaction_id,
        account_id: r.account_id,
        symbol_id: r.symbol_id,
        operation,
        when,
        sum,
        asset: r.asset,
        eur_equivalent,
        comment: r.comment,
        uuid: r.uuid,
        parent_uuid: r.parent_uuid,
    })
}
