// src/simulation/mod.rs
//
// In-process stand-ins for the external collaborators the engine consumes:
// token custody and asset pricing.

pub mod price_feed;
pub mod token_ledger;

pub use price_feed::StaticPriceFeed;
pub use token_ledger::{TokenInfo, TokenLedger};
