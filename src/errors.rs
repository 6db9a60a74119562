//! All error types, re-exported in one place.

pub use crate::imports::exante::ExanteError;
pub use crate::model::builders::BuildError;
pub use crate::model::matcher::MatchError;
pub use crate::model::reconstruct::ReconstructError;
pub use crate::model::rows::InvalidRowError;
pub use crate::model::trader::TraderError;
pub use crate::model::wallet::InsufficientAssetError;
pub use crate::quotes::QuoteError;
