//! Pricing math
//!
//! Pure functions over order books and quotes. Everything is computed with
//! `rust_decimal::Decimal`; nothing here performs I/O or returns an error for
//! well-typed input (an empty book yields zero or `None`, never a failure).

pub mod vwap;
pub mod layers;
pub mod maker;

pub use vwap::*;
pub use layers::*;
pub use maker::*;
