pub mod strategy;
pub mod trading;

pub use strategy::*;
pub use trading::*;
