//! FIFO matching of sells against open buy lots.

use crate::model::pairs::BuySellPair;
use crate::model::transactions::{BuyTx, SellTx, Share};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
pub enum MatchError {
    #[error("Insufficient {asset}: tried to sell {requested}, own {owned}")]
    InsufficientAsset {
        asset: String,
        requested: Decimal,
        owned: Decimal,
    },

    #[error("Stock split by {ratio} would leave a fractional {symbol} quantity: {left}")]
    NonIntegralSplit {
        symbol: String,
        left: Decimal,
        ratio: Decimal,
    },
}

/// A buy with its unsold remainder.
#[derive(Clone, Debug)]
struct OwnedLot {
    buy: BuyTx,
    left: Decimal,
}

/// Matches sells against buy lots, oldest lot first.
///
/// Lot order is arrival order; the caller feeds transactions in ascending
/// date order, so arrival order and date order coincide.
#[derive(Debug, Default)]
pub struct FifoMatcher {
    lots: Vec<OwnedLot>,
    pairs: Vec<BuySellPair>,
}

impl FifoMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buy(&mut self, buy: &BuyTx) {
        self.lots.push(OwnedLot {
            buy: buy.clone(),
            left: buy.quantity,
        });
    }

    /// Consume open lots to satisfy `sell`, emitting one pair per lot touched.
    pub fn sell(&mut self, sell: &SellTx) -> Result<(), MatchError> {
        let owned: Decimal = self
            .lots
            .iter()
            .filter(|lot| lot.buy.asset == sell.asset)
            .map(|lot| lot.left)
            .sum();
        if owned < sell.quantity {
            return Err(MatchError::InsufficientAsset {
                asset: sell.asset.clone(),
                requested: sell.quantity,
                owned,
            });
        }

        let mut remaining = sell.quantity;
        for lot in &mut self.lots {
            if remaining.is_zero() {
                break;
            }
            if lot.buy.asset != sell.asset || lot.left.is_zero() {
                continue;
            }

            let amount = remaining.min(lot.left);
            lot.left -= amount;
            remaining -= amount;

            debug!(
                "Matched {amount} {} from buy {} against sell {}",
                sell.asset, lot.buy.transaction_id, sell.transaction_id
            );
            self.pairs
                .push(BuySellPair::new(lot.buy.clone(), sell.clone(), amount));
        }

        Ok(())
    }

    /// Relabel open lots after an asset identity change.
    ///
    /// Already emitted pairs keep the old symbol: they are historical fact.
    pub fn corporate_action(&mut self, from_share: &Share, to_share: &Share) {
        for lot in &mut self.lots {
            if lot.buy.asset == from_share.symbol {
                lot.buy.asset = to_share.symbol.clone();
            }
        }
    }

    /// Rescale open lots by `to_share.amount / from_share.amount`.
    pub fn stock_split(&mut self, from_share: &Share, to_share: &Share) -> Result<(), MatchError> {
        let ratio = to_share.amount / from_share.amount;

        // Validate every lot before touching any of them.
        for lot in &self.lots {
            if lot.buy.asset != from_share.symbol {
                continue;
            }
            let left = lot.left * ratio;
            if left != left.trunc() {
                return Err(MatchError::NonIntegralSplit {
                    symbol: from_share.symbol.clone(),
                    left: lot.left,
                    ratio,
                });
            }
        }

        for lot in &mut self.lots {
            if lot.buy.asset == from_share.symbol {
                lot.left *= ratio;
                lot.buy.quantity *= ratio;
            }
        }
        Ok(())
    }

    pub fn pairs(&self) -> &[BuySellPair] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<BuySellPair> {
        self.pairs
    }
}
