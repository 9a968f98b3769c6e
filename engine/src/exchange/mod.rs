//! Exchange integration module
//!
//! `ExchangeClient` is the per-account capability the algorithms trade through;
//! `ExchangeHub` is the shared pool of clients plus the order tracking used to
//! cancel a user's unfilled orders.

pub mod client;
pub mod hub;
pub mod paper;
pub mod types;

pub use client::*;
pub use hub::*;
pub use paper::{PaperExchange, PaperOp, PaperVenue};
pub use types::*;
