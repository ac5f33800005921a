mod builder;
mod http_client;
mod local;

pub use builder::{ClientBuilder, Transport};
pub use http_client::{HttpClient, DEFAULT_MAX_CONNECTIONS};
pub use local::{LocalClient, MEMORY_TARGET};

use crate::protocol::{DriverError, ResultSet, Value};

/// A connection to one target, over whichever transport its descriptor
/// selected. Cheap to clone; clones share the underlying connection.
#[derive(Clone)]
pub enum Client {
    Http(HttpClient),
    Local(LocalClient),
}

impl Client {
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<ResultSet, DriverError> {
        tracing::trace!("execute: {}", sql);
        match self {
            Client::Http(client) => client.execute(sql, &params).await,
            Client::Local(client) => client.execute(sql, &params).await,
        }
    }

    pub fn transport(&self) -> Transport {
        match self {
            Client::Http(_) => Transport::Http,
            Client::Local(_) => Transport::Local,
        }
    }
}

impl From<HttpClient> for Client {
    fn from(client: HttpClient) -> Self {
        Client::Http(client)
    }
}

impl From<LocalClient> for Client {
    fn from(client: LocalClient) -> Self {
        Client::Local(client)
    }
}
