//! Per-asset balance ledger with solvency enforcement.

use crate::model::transactions::{AutoConversion, Transaction};
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
#[error("Insufficient {asset}: balance would drop to {balance}")]
pub struct InsufficientAssetError {
    pub asset: String,
    pub balance: Decimal,
}

/// Asset code (currency or instrument symbol) mapped to its balance.
///
/// Every operation is simulate-then-commit: its whole net effect is applied
/// to a scratch copy first, and the live ledger only changes when no touched
/// balance ends up negative.
#[derive(Debug, Default)]
pub struct Wallet {
    assets: HashMap<String, Decimal>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assets(&self) -> &HashMap<String, Decimal> {
        &self.assets
    }

    pub fn balance(&self, asset: &str) -> Decimal {
        self.assets.get(asset).copied().unwrap_or_default()
    }

    pub fn apply(&mut self, tx: &Transaction) -> Result<(), InsufficientAssetError> {
        let mut deltas = Vec::new();

        match tx {
            Transaction::Funding { amount, .. } => {
                // Money arriving from outside cannot fail.
                self.add(&amount.currency, amount.amount);
                return Ok(());
            }
            Transaction::Withdrawal { amount, .. } => {
                deltas.push((amount.currency.clone(), -amount.amount));
            }
            Transaction::Exchange { from, to, .. } => {
                deltas.push((from.currency.clone(), -from.amount));
                deltas.push((to.currency.clone(), to.amount));
            }
            Transaction::AutoConversion(conv) => {
                push_conversions(std::slice::from_ref(conv), &mut deltas);
            }
            Transaction::Buy(buy) => {
                // Autoconvert first: the broker exchanges currency to fund
                // the purchase before paying for it.
                push_conversions(&buy.autoconversions, &mut deltas);
                deltas.push((buy.paid.currency.clone(), -buy.paid.amount));
                deltas.push((buy.commission.currency.clone(), -buy.commission.amount));
                deltas.push((buy.asset.clone(), buy.quantity));
            }
            Transaction::Sell(sell) => {
                push_conversions(&sell.autoconversions, &mut deltas);
                deltas.push((sell.asset.clone(), -sell.quantity));
                deltas.push((sell.received.currency.clone(), sell.received.amount));
                deltas.push((sell.commission.currency.clone(), -sell.commission.amount));
            }
            Transaction::Dividend(div) => {
                // Dividends never fail; withheld amounts are covered by the
                // payout itself.
                self.add(&div.received.currency, div.received.amount);
                for conv in &div.autoconversions {
                    self.add(&conv.from.currency, -conv.from.amount);
                    self.add(&conv.to.currency, conv.to.amount);
                }
                if let Some(tax) = &div.paid_tax {
                    self.add(&tax.currency, -tax.amount);
                }
                if let Some(fee) = &div.issuance_fee {
                    self.add(&fee.currency, -fee.amount);
                }
                return Ok(());
            }
            Transaction::Tax(tax) => {
                deltas.push((tax.paid.currency.clone(), -tax.paid.amount));
            }
            Transaction::IssuanceFee { paid, .. } | Transaction::Fee { paid, .. } => {
                deltas.push((paid.currency.clone(), -paid.amount));
            }
            Transaction::CorporateAction {
                from_share,
                to_share,
                ..
            }
            | Transaction::StockSplit {
                from_share,
                to_share,
                ..
            } => {
                deltas.push((from_share.symbol.clone(), -from_share.amount));
                deltas.push((to_share.symbol.clone(), to_share.amount));
            }
        }

        self.commit(deltas)
    }

    /// Apply all deltas to a scratch copy, then swap it in if every touched
    /// balance stayed non-negative.
    fn commit(&mut self, deltas: Vec<(String, Decimal)>) -> Result<(), InsufficientAssetError> {
        let mut scratch = self.assets.clone();
        for (asset, delta) in &deltas {
            *scratch.entry(asset.clone()).or_default() += delta;
        }

        for (asset, _) in &deltas {
            let balance = scratch.get(asset).copied().unwrap_or_default();
            if balance < Decimal::ZERO {
                return Err(InsufficientAssetError {
                    asset: asset.clone(),
                    balance,
                });
            }
        }

        self.assets = scratch;
        Ok(())
    }

    fn add(&mut self, asset: &str, delta: Decimal) {
        *self.assets.entry(asset.to_string()).or_default() += delta;
    }
}

fn push_conversions(convs: &[AutoConversion], deltas: &mut Vec<(String, Decimal)>) {
    for conv in convs {
        deltas.push((conv.from.currency.clone(), -conv.from.amount));
        deltas.push((conv.to.currency.clone(), conv.to.amount));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::transactions::{BuyTx, DividendTx, Money, SellTx, Share, TaxTx};
    use chrono::NaiveDateTime;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn when() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2020-10-20 20:40:55", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn funding(amount: &str, currency: &str) -> Transaction {
        Transaction::Funding {
            amount: Money::new(dec(amount), currency),
            date: when(),
            transaction_id: 1,
        }
    }

    #[test]
    fn fund_credits_balance() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("1000", "EUR")).unwrap();

        assert_eq!(wallet.balance("EUR"), dec("1000"));
    }

    #[test]
    fn withdraw_within_balance() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("1000", "EUR")).unwrap();
        wallet
            .apply(&Transaction::Withdrawal {
                amount: Money::new(dec("400"), "EUR"),
                date: when(),
                transaction_id: 2,
            })
            .unwrap();

        assert_eq!(wallet.balance("EUR"), dec("600"));
    }

    #[test]
    fn withdraw_more_than_owned_fails_and_leaves_wallet_unchanged() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("100", "EUR")).unwrap();

        let err = wallet
            .apply(&Transaction::Withdrawal {
                amount: Money::new(dec("150"), "EUR"),
                date: when(),
                transaction_id: 2,
            })
            .unwrap_err();

        assert_eq!(
            err,
            InsufficientAssetError {
                asset: "EUR".to_string(),
                balance: dec("-50"),
            }
        );
        assert_eq!(wallet.balance("EUR"), dec("100"));
    }

    #[test]
    fn exchange_moves_between_currencies() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("1000", "EUR")).unwrap();
        wallet
            .apply(&Transaction::Exchange {
                from: Money::new(dec("1000"), "EUR"),
                to: Money::new(dec("1500"), "USD"),
                date: when(),
                transaction_id: 2,
            })
            .unwrap();

        assert_eq!(wallet.balance("EUR"), Decimal::ZERO);
        assert_eq!(wallet.balance("USD"), dec("1500"));
    }

    #[test]
    fn standalone_autoconversion_behaves_like_exchange() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("1000", "USD")).unwrap();
        wallet
            .apply(&Transaction::AutoConversion(AutoConversion {
                from: Money::new(dec("1000"), "USD"),
                to: Money::new(dec("2000"), "SGD"),
                date: when(),
                transaction_id: 2,
            }))
            .unwrap();

        assert_eq!(wallet.balance("USD"), Decimal::ZERO);
        assert_eq!(wallet.balance("SGD"), dec("2000"));
    }

    fn buy_phys(paid: &str, commission: &str) -> BuyTx {
        BuyTx {
            asset: "PHYS.ARCA".to_string(),
            quantity: dec("100"),
            paid: Money::new(dec(paid), "USD"),
            commission: Money::new(dec(commission), "USD"),
            autoconversions: Vec::new(),
            date: when(),
            transaction_id: 2,
        }
    }

    #[test]
    fn buy_debits_money_and_credits_shares() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("1500", "USD")).unwrap();
        wallet.apply(&Transaction::Buy(buy_phys("1300", "2"))).unwrap();

        assert_eq!(wallet.balance("USD"), dec("198"));
        assert_eq!(wallet.balance("PHYS.ARCA"), dec("100"));
    }

    #[test]
    fn buy_beyond_balance_fails_and_leaves_wallet_unchanged() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("100", "USD")).unwrap();

        let err = wallet
            .apply(&Transaction::Buy(buy_phys("150", "0")))
            .unwrap_err();

        assert_eq!(err.asset, "USD");
        assert_eq!(wallet.balance("USD"), dec("100"));
        assert_eq!(wallet.balance("PHYS.ARCA"), Decimal::ZERO);
    }

    #[test]
    fn buy_funded_by_autoconversion() {
        // Hold EUR only; the broker converts to USD and pays from that.
        let mut wallet = Wallet::new();
        wallet.apply(&funding("1000", "EUR")).unwrap();

        let mut buy = buy_phys("1100", "0");
        buy.autoconversions.push(AutoConversion {
            from: Money::new(dec("1000"), "EUR"),
            to: Money::new(dec("1100"), "USD"),
            date: when(),
            transaction_id: 2,
        });
        wallet.apply(&Transaction::Buy(buy)).unwrap();

        assert_eq!(wallet.balance("EUR"), Decimal::ZERO);
        assert_eq!(wallet.balance("USD"), Decimal::ZERO);
        assert_eq!(wallet.balance("PHYS.ARCA"), dec("100"));
    }

    #[test]
    fn sell_debits_shares_and_credits_money() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("1500", "USD")).unwrap();
        wallet.apply(&Transaction::Buy(buy_phys("1300", "0"))).unwrap();

        wallet
            .apply(&Transaction::Sell(SellTx {
                asset: "PHYS.ARCA".to_string(),
                quantity: dec("100"),
                received: Money::new(dec("1400"), "USD"),
                commission: Money::new(dec("2"), "USD"),
                autoconversions: Vec::new(),
                date: when(),
                transaction_id: 3,
            }))
            .unwrap();

        assert_eq!(wallet.balance("PHYS.ARCA"), Decimal::ZERO);
        assert_eq!(wallet.balance("USD"), dec("1598"));
    }

    #[test]
    fn dividend_with_tax_on_empty_wallet() {
        let mut wallet = Wallet::new();
        wallet
            .apply(&Transaction::Dividend(DividendTx {
                received: Money::new(dec("100"), "USD"),
                paid_tax: Some(Money::new(dec("15"), "USD")),
                issuance_fee: None,
                autoconversions: Vec::new(),
                date: when(),
                transaction_id: 1,
                comment: String::new(),
            }))
            .unwrap();

        assert_eq!(wallet.balance("USD"), dec("85"));
    }

    #[test]
    fn dividend_with_tax_and_issuance_fee() {
        let mut wallet = Wallet::new();
        wallet
            .apply(&Transaction::Dividend(DividendTx {
                received: Money::new(dec("100"), "USD"),
                paid_tax: Some(Money::new(dec("15"), "USD")),
                issuance_fee: Some(Money::new(dec("0.5"), "USD")),
                autoconversions: Vec::new(),
                date: when(),
                transaction_id: 1,
                comment: String::new(),
            }))
            .unwrap();

        assert_eq!(wallet.balance("USD"), dec("84.5"));
    }

    #[test]
    fn tax_beyond_balance_fails() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("5", "USD")).unwrap();

        let err = wallet
            .apply(&Transaction::Tax(TaxTx {
                paid: Money::new(dec("7"), "USD"),
                date: when(),
                transaction_id: 2,
                comment: String::new(),
            }))
            .unwrap_err();

        assert_eq!(err.asset, "USD");
        assert_eq!(wallet.balance("USD"), dec("5"));
    }

    #[test]
    fn corporate_action_moves_share_balance() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("1300", "USD")).unwrap();
        let mut buy = buy_phys("1300", "0");
        buy.asset = "SHY.ARCA".to_string();
        wallet.apply(&Transaction::Buy(buy)).unwrap();

        wallet
            .apply(&Transaction::CorporateAction {
                from_share: Share::new(dec("100"), "SHY.ARCA"),
                to_share: Share::new(dec("100"), "SHY.NASDAQ"),
                date: when(),
                transaction_id: 3,
            })
            .unwrap();

        assert_eq!(wallet.balance("SHY.ARCA"), Decimal::ZERO);
        assert_eq!(wallet.balance("SHY.NASDAQ"), dec("100"));
    }

    #[test]
    fn corporate_action_on_unowned_share_fails() {
        let mut wallet = Wallet::new();

        let err = wallet
            .apply(&Transaction::CorporateAction {
                from_share: Share::new(dec("100"), "SHY.ARCA"),
                to_share: Share::new(dec("100"), "SHY.NASDAQ"),
                date: when(),
                transaction_id: 1,
            })
            .unwrap_err();

        assert_eq!(err.asset, "SHY.ARCA");
    }

    #[test]
    fn stock_split_replaces_quantity() {
        let mut wallet = Wallet::new();
        wallet.apply(&funding("1300", "USD")).unwrap();
        let mut buy = buy_phys("1300", "0");
        buy.asset = "ACME.NYSE".to_string();
        wallet.apply(&Transaction::Buy(buy)).unwrap();

        wallet
            .apply(&Transaction::StockSplit {
                from_share: Share::new(dec("100"), "ACME.NYSE"),
                to_share: Share::new(dec("200"), "ACME.NYSE"),
                date: when(),
                transaction_id: 3,
            })
            .unwrap();

        assert_eq!(wallet.balance("ACME.NYSE"), dec("200"));
    }
}
