pub mod builders;
pub mod declaration;
pub mod matcher;
pub mod pairs;
pub mod profit;
pub mod reconstruct;
pub mod report;
pub mod rollback;
pub mod rows;
pub mod stats;
pub mod trader;
pub mod transactions;
pub mod wallet;

pub use self::{
    declaration::{DeclarationCalculator, TaxDeclaration},
    matcher::FifoMatcher,
    pairs::BuySellPair,
    profit::TradeProfit,
    report::TradingReport,
    rows::{OperationKind, ReportRow},
    stats::Stats,
    trader::Trader,
    transactions::{Money, Share, Transaction},
    wallet::Wallet,
};
