//! Typed transactions reconstructed from report rows.
//!
//! Sign convention: every amount stored here is non-negative. The direction of
//! the flow is carried by the variant (a `Withdrawal` debits, a `Funding`
//! credits), not by the sign of the stored value.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt::{self, Display};

/// ISO-4217 codes accepted as money, the fixed set NBP publishes table A
/// fixings for, plus PLN. A "three uppercase letters" test is not enough;
/// tickers like `TLT` would pass it.
const CURRENCIES: &[&str] = &[
    "AUD", "BGN", "BRL", "CAD", "CHF", "CLP", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD", "HUF",
    "IDR", "ILS", "INR", "ISK", "JPY", "KRW", "MXN", "MYR", "NOK", "NZD", "PHP", "PLN", "RON",
    "RUB", "SEK", "SGD", "THB", "TRY", "UAH", "USD", "ZAR",
];

/// Does this asset code name a currency (as opposed to an instrument symbol)?
pub fn is_currency(asset: &str) -> bool {
    CURRENCIES.binary_search(&asset).is_ok()
}

/// A currency amount, non-negative by convention (see module docs).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// A quantity of one instrument, identified by its exchange symbol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Share {
    pub amount: Decimal,
    pub symbol: String,
}

impl Share {
    pub fn new(amount: Decimal, symbol: impl Into<String>) -> Self {
        Self {
            amount,
            symbol: symbol.into(),
        }
    }
}

impl Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.symbol)
    }
}

/// A currency exchange the broker performed automatically, either standalone
/// or attached to a trade or dividend it was funding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AutoConversion {
    pub from: Money,
    pub to: Money,
    pub date: NaiveDateTime,
    pub transaction_id: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuyTx {
    pub asset: String,
    pub quantity: Decimal,
    pub paid: Money,
    pub commission: Money,
    pub autoconversions: Vec<AutoConversion>,
    pub date: NaiveDateTime,
    pub transaction_id: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SellTx {
    pub asset: String,
    pub quantity: Decimal,
    pub received: Money,
    pub commission: Money,
    pub autoconversions: Vec<AutoConversion>,
    pub date: NaiveDateTime,
    pub transaction_id: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DividendTx {
    pub received: Money,
    pub paid_tax: Option<Money>,
    pub issuance_fee: Option<Money>,
    pub autoconversions: Vec<AutoConversion>,
    pub date: NaiveDateTime,
    pub transaction_id: u64,
    pub comment: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaxTx {
    pub paid: Money,
    pub date: NaiveDateTime,
    pub transaction_id: u64,
    pub comment: String,
}

/// One fully reconstructed broker transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum Transaction {
    Funding {
        amount: Money,
        date: NaiveDateTime,
        transaction_id: u64,
    },
    Withdrawal {
        amount: Money,
        date: NaiveDateTime,
        transaction_id: u64,
    },
    Exchange {
        from: Money,
        to: Money,
        date: NaiveDateTime,
        transaction_id: u64,
    },
    AutoConversion(AutoConversion),
    Buy(BuyTx),
    Sell(SellTx),
    Dividend(DividendTx),
    Tax(TaxTx),
    IssuanceFee {
        paid: Money,
        date: NaiveDateTime,
        transaction_id: u64,
    },
    Fee {
        paid: Money,
        date: NaiveDateTime,
        transaction_id: u64,
    },
    CorporateAction {
        from_share: Share,
        to_share: Share,
        date: NaiveDateTime,
        transaction_id: u64,
    },
    StockSplit {
        from_share: Share,
        to_share: Share,
        date: NaiveDateTime,
        transaction_id: u64,
    },
}

impl Transaction {
    pub fn date(&self) -> NaiveDateTime {
        match self {
            Self::Funding { date, .. }
            | Self::Withdrawal { date, .. }
            | Self::Exchange { date, .. }
            | Self::IssuanceFee { date, .. }
            | Self::Fee { date, .. }
            | Self::CorporateAction { date, .. }
            | Self::StockSplit { date, .. } => *date,
            Self::AutoConversion(conv) => conv.date,
            Self::Buy(buy) => buy.date,
            Self::Sell(sell) => sell.date,
            Self::Dividend(div) => div.date,
            Self::Tax(tax) => tax.date,
        }
    }

    pub fn transaction_id(&self) -> u64 {
        match self {
            Self::Funding { transaction_id, .. }
            | Self::Withdrawal { transaction_id, .. }
            | Self::Exchange { transaction_id, .. }
            | Self::IssuanceFee { transaction_id, .. }
            | Self::Fee { transaction_id, .. }
            | Self::CorporateAction { transaction_id, .. }
            | Self::StockSplit { transaction_id, .. } => *transaction_id,
            Self::AutoConversion(conv) => conv.transaction_id,
            Self::Buy(buy) => buy.transaction_id,
            Self::Sell(sell) => sell.transaction_id,
            Self::Dividend(div) => div.transaction_id,
            Self::Tax(tax) => tax.transaction_id,
        }
    }
}
