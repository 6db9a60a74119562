//! PIT-38 declaration totals.
//!
//! Share trades and dividends are taxed in separate buckets: a trading loss
//! never offsets dividend tax, and withheld foreign tax only reduces the
//! dividend side.

use crate::model::profit::TradeProfit;
use crate::quotes::{QuotedDividend, QuotedTax};
use rust_decimal::Decimal;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct TaxDeclaration {
    pub shares_total_income: Decimal,
    pub shares_total_cost: Decimal,
    pub shares_total_tax: Decimal,
    pub dividends_total_income: Decimal,
    pub dividends_total_tax: Decimal,
    pub dividends_tax_already_paid: Decimal,
    pub dividends_tax_yet_to_be_paid: Decimal,
    pub tax_percentage_used: Decimal,
}

impl fmt::Display for TaxDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Shares income: {} PLN", self.shares_total_income)?;
        writeln!(f, "Shares cost: {} PLN", self.shares_total_cost)?;
        writeln!(f, "Shares tax due: {} PLN", self.shares_total_tax)?;
        writeln!(f, "Dividends income: {} PLN", self.dividends_total_income)?;
        writeln!(f, "Dividends tax due: {} PLN", self.dividends_total_tax)?;
        writeln!(
            f,
            "Dividends tax already paid: {} PLN",
            self.dividends_tax_already_paid
        )?;
        writeln!(
            f,
            "Dividends tax yet to be paid: {} PLN",
            self.dividends_tax_yet_to_be_paid
        )?;
        write!(f, "Tax rate used: {}%", self.tax_percentage_used)
    }
}

pub struct DeclarationCalculator {
    tax_percentage: Decimal,
}

impl Default for DeclarationCalculator {
    fn default() -> Self {
        Self::new(Decimal::from(19))
    }
}

impl DeclarationCalculator {
    pub fn new(tax_percentage: Decimal) -> Self {
        Self { tax_percentage }
    }

    pub fn calculate(
        &self,
        trades: &[TradeProfit],
        dividends: &[QuotedDividend],
        taxes: &[QuotedTax],
    ) -> TaxDeclaration {
        let rate = self.tax_percentage / Decimal::from(100);

        let shares_total_income: Decimal = trades.iter().map(|t| t.received_pln).sum();
        let shares_total_cost: Decimal = trades.iter().map(|t| t.paid_pln).sum();
        // A loss carries no tax; it is not refunded.
        let shares_total_tax =
            ((shares_total_income - shares_total_cost) * rate).max(Decimal::ZERO);

        let dividends_total_income: Decimal = dividends.iter().map(|d| d.received_pln).sum();
        let dividends_total_tax = dividends_total_income * rate;
        let withheld: Decimal = dividends.iter().map(|d| d.paid_tax_pln).sum();
        let standalone: Decimal = taxes.iter().map(|t| t.paid_pln).sum();
        let dividends_tax_already_paid = withheld + standalone;
        let dividends_tax_yet_to_be_paid =
            (dividends_total_tax - dividends_tax_already_paid).max(Decimal::ZERO);

        TaxDeclaration {
            shares_total_income,
            shares_total_cost,
            shares_total_tax,
            dividends_total_income,
            dividends_total_tax,
            dividends_tax_already_paid,
            dividends_tax_yet_to_be_paid,
            tax_percentage_used: self.tax_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pairs::BuySellPair;
    use crate::model::transactions::{BuyTx, DividendTx, Money, SellTx, TaxTx};
    use crate::quotes::QuotedBuySellPair;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn day(n: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 10, n)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn trade(paid_pln: &str, received_pln: &str) -> TradeProfit {
        let buy = BuyTx {
            asset: "PHYS.ARCA".to_string(),
            quantity: dec("10"),
            paid: Money::new(dec("1"), "USD"),
            commission: Money::zero("USD"),
            autoconversions: Vec::new(),
            date: day(1),
            transaction_id: 1,
        };
        let sell = SellTx {
            asset: "PHYS.ARCA".to_string(),
            quantity: dec("10"),
            received: Money::new(dec("1"), "USD"),
            commission: Money::zero("USD"),
            autoconversions: Vec::new(),
            date: day(2),
            transaction_id: 2,
        };
        TradeProfit {
            source: QuotedBuySellPair {
                source: BuySellPair::new(buy, sell, dec("10")),
                buy_quotation_date: NaiveDate::from_ymd_opt(2020, 9, 30).unwrap(),
                buy_paid_pln: dec(paid_pln),
                buy_commission_pln: Decimal::ZERO,
                sell_quotation_date: NaiveDate::from_ymd_opt(2020, 10, 1).unwrap(),
                sell_received_pln: dec(received_pln),
                sell_commission_pln: Decimal::ZERO,
            },
            paid_pln: dec(paid_pln),
            received_pln: dec(received_pln),
        }
    }

    fn dividend(received_pln: &str, paid_tax_pln: &str) -> QuotedDividend {
        QuotedDividend {
            source: DividendTx {
                received: Money::new(dec("1"), "USD"),
                paid_tax: None,
                issuance_fee: None,
                autoconversions: Vec::new(),
                date: day(5),
                transaction_id: 3,
                comment: String::new(),
            },
            quotation_date: NaiveDate::from_ymd_opt(2020, 10, 2).unwrap(),
            received_pln: dec(received_pln),
            paid_tax_pln: dec(paid_tax_pln),
        }
    }

    fn standalone_tax(paid_pln: &str) -> QuotedTax {
        QuotedTax {
            source: TaxTx {
                paid: Money::new(dec("1"), "USD"),
                date: day(6),
                transaction_id: 4,
                comment: String::new(),
            },
            quotation_date: NaiveDate::from_ymd_opt(2020, 10, 2).unwrap(),
            paid_pln: dec(paid_pln),
        }
    }

    #[test]
    fn trading_profit_is_taxed_at_the_rate() {
        let calc = DeclarationCalculator::default();

        let declaration = calc.calculate(&[trade("3000", "4000")], &[], &[]);

        assert_eq!(declaration.shares_total_income, dec("4000"));
        assert_eq!(declaration.shares_total_cost, dec("3000"));
        assert_eq!(declaration.shares_total_tax, dec("190.00"));
    }

    #[test]
    fn trading_loss_clamps_tax_to_zero() {
        let calc = DeclarationCalculator::default();

        let declaration = calc.calculate(&[trade("4000", "3000")], &[], &[]);

        assert_eq!(declaration.shares_total_tax, Decimal::ZERO);
    }

    #[test]
    fn withheld_tax_offsets_the_dividend_due() {
        let calc = DeclarationCalculator::default();

        let declaration = calc.calculate(&[], &[dividend("400", "60")], &[]);

        assert_eq!(declaration.dividends_total_income, dec("400"));
        assert_eq!(declaration.dividends_total_tax, dec("76.00"));
        assert_eq!(declaration.dividends_tax_already_paid, dec("60"));
        assert_eq!(declaration.dividends_tax_yet_to_be_paid, dec("16.00"));
    }

    #[test]
    fn overpaid_withholding_is_not_refunded() {
        let calc = DeclarationCalculator::default();

        let declaration = calc.calculate(&[], &[dividend("100", "30")], &[]);

        assert_eq!(declaration.dividends_tax_yet_to_be_paid, Decimal::ZERO);
    }

    #[test]
    fn standalone_taxes_count_as_already_paid() {
        let calc = DeclarationCalculator::default();

        let declaration = calc.calculate(&[], &[dividend("400", "0")], &[standalone_tax("60")]);

        assert_eq!(declaration.dividends_tax_already_paid, dec("60"));
        assert_eq!(declaration.dividends_tax_yet_to_be_paid, dec("16.00"));
    }

    #[test]
    fn trading_loss_does_not_offset_dividends() {
        let calc = DeclarationCalculator::default();

        let declaration =
            calc.calculate(&[trade("4000", "3000")], &[dividend("400", "0")], &[]);

        assert_eq!(declaration.shares_total_tax, Decimal::ZERO);
        assert_eq!(declaration.dividends_total_tax, dec("76.00"));
    }

    #[test]
    fn custom_rate_is_applied() {
        let calc = DeclarationCalculator::new(dec("10"));

        let declaration = calc.calculate(&[trade("0", "1000")], &[], &[]);

        assert_eq!(declaration.shares_total_tax, dec("100.0"));
        assert_eq!(declaration.tax_percentage_used, dec("10"));
    }
}
