//! API request handlers

mod engines;
mod evaluate;
mod health;

pub use engines::*;
pub use evaluate::*;
pub use health::*;
