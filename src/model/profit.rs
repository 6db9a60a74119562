use crate::quotes::QuotedBuySellPair;
use rust_decimal::Decimal;

/// PLN cost and income attributable to one matched buy/sell pair.
///
/// Both legs are prorated by the matched amount: commissions raise the cost
/// side and lower the income side of their own leg.
#[derive(Clone, Debug)]
pub struct TradeProfit {
    pub source: QuotedBuySellPair,
    pub paid_pln: Decimal,
    pub received_pln: Decimal,
}

impl TradeProfit {
    pub fn from_quoted(quoted: QuotedBuySellPair) -> Self {
        let matched = quoted.source.amount_matched;
        let paid_pln = (quoted.buy_paid_pln + quoted.buy_commission_pln) * matched
            / quoted.source.buy.quantity;
        let received_pln = (quoted.sell_received_pln - quoted.sell_commission_pln) * matched
            / quoted.source.sell.quantity;

        Self {
            source: quoted,
            paid_pln,
            received_pln,
        }
    }

    pub fn profit(&self) -> Decimal {
        self.received_pln - self.paid_pln
    }
}
