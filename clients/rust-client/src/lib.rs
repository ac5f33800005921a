//! lagbench client
//!
//! Small libsql driver used by the lagbench harness. A target is either a
//! libsql server reached over HTTP (Hrana v2 pipeline) or a local SQLite file.
//!
//! # Example
//!
//! ```rust,no_run
//! use lagbench_client::{ClientBuilder, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lagbench_client::DriverError> {
//!     let client = ClientBuilder::new("file:local.db").build().await?;
//!
//!     client
//!         .execute("create table pony (id INTEGER PRIMARY KEY AUTOINCREMENT, name)", vec![])
//!         .await?;
//!     client
//!         .execute("insert into pony(name) VALUES (?)", vec![Value::from("Pony0")])
//!         .await?;
//!
//!     let rows = client.execute("select count(0) as c from pony", vec![]).await?;
//!     println!("{:?}", rows.rows);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod protocol;

pub use client::{Client, ClientBuilder, HttpClient, LocalClient, Transport};
pub use protocol::{DriverError, ResultSet, Value};
