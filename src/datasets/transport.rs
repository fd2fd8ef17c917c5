//! Transport for delegated files and the BGP table
//!
//! Remote `http(s)://` sources go through a `ureq` agent with a per-request
//! timeout and a fixed `User-Agent`. Anything else is treated as a local path and
//! opened with `oneio`, which also handles `.gz` and `.bz2` snapshots.

use crate::error::TransportError;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Opens a byte stream for a URL or path.
pub trait Transport: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn Read>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn open(&self, url: &str) -> Result<Box<dyn Read>, TransportError> {
        (**self).open(url)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn open(&self, url: &str) -> Result<Box<dyn Read>, TransportError> {
        (**self).open(url)
    }
}

pub struct HttpTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            user_agent: user_agent.into(),
        }
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Transport for HttpTransport {
    fn open(&self, url: &str) -> Result<Box<dyn Read>, TransportError> {
        if !is_remote(url) {
            debug!("reading local file {}", url);
            return oneio::get_reader(url)
                .map(|r| r as Box<dyn Read>)
                .map_err(|e| std::io::Error::other(format!("{}: {}", url, e)).into());
        }

        // non-2xx statuses come back as ureq::Error::StatusCode
        let response = self
            .agent
            .get(url)
            .header("User-Agent", self.user_agent.as_str())
            .call()?;
        debug!("{} responded with {}", url, response.status());
        Ok(Box::new(response.into_body().into_reader()))
    }
}
