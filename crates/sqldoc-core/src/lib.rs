//! sqldoc core - connection abstractions shared by the other sqldoc crates
//!
//! This crate defines:
//!
//! - `DatabaseDriver` - opens connections from a `ConnectionConfig`
//! - `Connection` - runs read-only queries
//! - `ConnectionProvider` - hands out connections to catalog readers
//! - Common types like `Value`, `Row` and `QueryResult`

mod connection;
mod driver;
mod error;
mod provider;
mod types;

#[cfg(test)]
mod provider_tests;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use provider::*;
pub use types::*;
