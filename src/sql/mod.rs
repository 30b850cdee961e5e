//! SQL generation, parameter binding and execution for the `Any` driver.

mod builder;
pub mod dialect;
pub mod exec;
pub mod params;

pub use builder::*;
pub use dialect::Dialect;
pub use params::*;
