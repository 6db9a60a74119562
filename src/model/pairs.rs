//! Matched buy/sell lot pairs.

use crate::model::transactions::{BuyTx, SellTx};
use rust_decimal::Decimal;

/// One FIFO match: `amount_matched` units of `sell` drawn from `buy`.
///
/// The buy side is captured as held at match time, so earlier corporate
/// actions and splits are already reflected in its symbol and quantity.
#[derive(Clone, Debug, PartialEq)]
pub struct BuySellPair {
    pub buy: BuyTx,
    pub sell: SellTx,
    pub amount_matched: Decimal,
}

impl BuySellPair {
    pub(crate) fn new(buy: BuyTx, sell: SellTx, amount_matched: Decimal) -> Self {
        debug_assert!(buy.date <= sell.date);
        debug_assert!(buy.transaction_id <= sell.transaction_id);
        debug_assert!(amount_matched > Decimal::ZERO);
        debug_assert!(amount_matched <= buy.quantity);
        debug_assert!(amount_matched <= sell.quantity);

        Self {
            buy,
            sell,
            amount_matched,
        }
    }
}
