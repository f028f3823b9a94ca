//! SQL Server and Azure SQL Database driver for sqldoc
//!
//! Connections are made with tiberius over a tokio TCP stream. SQL logins and
//! caller-supplied Azure AD access tokens are supported.

mod connection;
mod driver;

#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod driver_tests;

pub use connection::{MssqlAuth, MssqlConnection, MssqlConnectionError, MssqlConnectOptions};
pub use driver::MssqlDriver;
