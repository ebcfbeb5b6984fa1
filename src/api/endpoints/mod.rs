//! API endpoint handlers, one module per task family.

pub mod health;
pub mod imaging;
pub mod sentiment;
pub mod sequence;
pub mod tabular;
