//! Types shared by both transports.
//!
//! `hrana` holds the JSON shapes spoken by a libsql server over HTTP; the
//! rest is transport independent.

mod error;
pub mod hrana;
mod types;

pub use error::DriverError;
pub use types::{ResultSet, Value};
