//! PLN quotation of foreign-currency amounts.
//!
//! Polish tax law values a foreign-currency amount at the average exchange
//! rate published for the last working day before the transaction date.
//! [`WorkingDayBeforeQuoter`] implements that lookback on top of any
//! [`QuotesProvider`].

pub mod nbp;

use crate::model::pairs::BuySellPair;
use crate::model::transactions::{DividendTx, TaxTx};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Weekday};
use rust_decimal::Decimal;
use thiserror::Error;

/// How many days back to probe before giving up. Long market holidays
/// (Christmas, Easter) never exceed this window.
const MAX_QUOTE_ATTEMPTS: u32 = 5;

pub trait QuotesProvider {
    /// Average rate of one unit of `currency` in PLN on `day`, or `None`
    /// when no quote was published that day.
    fn average_rate(&self, currency: &str, day: NaiveDate) -> Option<Decimal>;
}

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
pub enum QuoteError {
    #[error("No PLN quotes available for {currency} between {from} and {to}")]
    NoQuotesAvailable {
        currency: String,
        from: NaiveDate,
        to: NaiveDate,
    },
}

/// A buy/sell pair with both legs valued in PLN.
#[derive(Clone, Debug)]
pub struct QuotedBuySellPair {
    pub source: BuySellPair,
    pub buy_quotation_date: NaiveDate,
    /// Full lot cost in PLN, before matching proration.
    pub buy_paid_pln: Decimal,
    pub buy_commission_pln: Decimal,
    pub sell_quotation_date: NaiveDate,
    /// Full sell proceeds in PLN, before matching proration.
    pub sell_received_pln: Decimal,
    pub sell_commission_pln: Decimal,
}

#[derive(Clone, Debug)]
pub struct QuotedDividend {
    pub source: DividendTx,
    pub quotation_date: NaiveDate,
    pub received_pln: Decimal,
    pub paid_tax_pln: Decimal,
}

#[derive(Clone, Debug)]
pub struct QuotedTax {
    pub source: TaxTx,
    pub quotation_date: NaiveDate,
    pub paid_pln: Decimal,
}

pub struct WorkingDayBeforeQuoter<P> {
    provider: P,
}

impl<P: QuotesProvider> WorkingDayBeforeQuoter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// PLN value of `amount` of `currency` and the quotation date used.
    ///
    /// Probes strictly before `when`, skipping weekends, for up to
    /// [`MAX_QUOTE_ATTEMPTS`] published days. PLN amounts are the one
    /// exception: no conversion happens and the returned quotation date is
    /// `when`'s own date.
    pub fn quote(
        &self,
        amount: Decimal,
        currency: &str,
        when: NaiveDateTime,
    ) -> Result<(Decimal, NaiveDate), QuoteError> {
        if currency == "PLN" {
            return Ok((amount, when.date()));
        }

        let latest = when.date() - Days::new(1);
        let mut day = latest;
        for _ in 0..MAX_QUOTE_ATTEMPTS {
            while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                day = day - Days::new(1);
            }
            if let Some(rate) = self.provider.average_rate(currency, day) {
                return Ok((amount * rate, day));
            }
            day = day - Days::new(1);
        }

        Err(QuoteError::NoQuotesAvailable {
            currency: currency.to_string(),
            from: day + Days::new(1),
            to: latest,
        })
    }

    pub fn quote_pair(&self, pair: BuySellPair) -> Result<QuotedBuySellPair, QuoteError> {
        let buy = &pair.buy;
        let (buy_paid_pln, buy_quotation_date) =
            self.quote(buy.paid.amount, &buy.paid.currency, buy.date)?;
        let buy_commission_pln = if buy.commission.amount.is_zero() {
            Decimal::ZERO
        } else {
            self.quote(buy.commission.amount, &buy.commission.currency, buy.date)?
                .0
        };

        let sell = &pair.sell;
        let (sell_received_pln, sell_quotation_date) =
            self.quote(sell.received.amount, &sell.received.currency, sell.date)?;
        let sell_commission_pln = if sell.commission.amount.is_zero() {
            Decimal::ZERO
        } else {
            self.quote(sell.commission.amount, &sell.commission.currency, sell.date)?
                .0
        };

        debug_assert!(buy_quotation_date <= sell_quotation_date);

        Ok(QuotedBuySellPair {
            source: pair,
            buy_quotation_date,
            buy_paid_pln,
            buy_commission_pln,
            sell_quotation_date,
            sell_received_pln,
            sell_commission_pln,
        })
    }

    pub fn quote_dividend(&self, div: DividendTx) -> Result<QuotedDividend, QuoteError> {
        let (received_pln, quotation_date) =
            self.quote(div.received.amount, &div.received.currency, div.date)?;
        let paid_tax_pln = match &div.paid_tax {
            Some(tax) => self.quote(tax.amount, &tax.currency, div.date)?.0,
            None => Decimal::ZERO,
        };

        Ok(QuotedDividend {
            source: div,
            quotation_date,
            received_pln,
            paid_tax_pln,
        })
    }

    pub fn quote_tax(&self, tax: TaxTx) -> Result<QuotedTax, QuoteError> {
        let (paid_pln, quotation_date) =
            self.quote(tax.paid.amount, &tax.paid.currency, tax.date)?;

        Ok(QuotedTax {
            source: tax,
            quotation_date,
            paid_pln,
        })
    }
}
