#![forbid(unsafe_code)]

pub mod errors;
pub mod imports;
pub mod model;
pub mod quotes;
pub mod util;
