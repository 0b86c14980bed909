// Module HTTP client
//
// Wraps `reqwest::Client` with state-document URL construction, per-call
// timeouts and document decoding. Reads and writes are the same request:
// a GET of `customState.json`, with writes carried as query parameters.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, trace};
use url::Url;

use crate::document::{StateDocument, parse_document};
use crate::error::Error;
use crate::transport::TransportConfig;

/// File name of the state document served by the module.
pub const STATE_DOCUMENT: &str = "customState.json";

/// Raw HTTP client for one IO module.
///
/// Stateless apart from the connection pool: every call is a single
/// request, and failures are returned without retrying.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    state_url: Url,
}

impl DeviceClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the module root (e.g. `https://192.168.100.20/`); a URL
    /// that already names `customState.json` is used as-is.
    pub fn new(base_url: &Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, base_url)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: &Url) -> Result<Self, Error> {
        let state_url = state_document_url(base_url)?;
        Ok(Self { http, state_url })
    }

    /// The full URL of the state document.
    pub fn url(&self) -> &Url {
        &self.state_url
    }

    /// Fetch the complete state document.
    pub async fn fetch_state(&self, timeout: Duration) -> Result<StateDocument, Error> {
        self.get(None, timeout).await
    }

    /// Send address/value pairs in a single request.
    ///
    /// The module applies the writes and answers with its full state,
    /// which is returned to the caller.
    pub async fn send_values(
        &self,
        values: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<StateDocument, Error> {
        self.get(Some(values), timeout).await
    }

    async fn get(
        &self,
        params: Option<&BTreeMap<String, String>>,
        timeout: Duration,
    ) -> Result<StateDocument, Error> {
        debug!(
            url = %self.state_url,
            params = params.map_or(0, BTreeMap::len),
            "GET"
        );

        let mut request = self.http.get(self.state_url.clone()).timeout(timeout);
        if let Some(params) = params {
            request = request.query(params);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| map_send_error(e, timeout))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| map_send_error(e, timeout))?;
        trace!(status = status.as_u16(), body = %body, "state response");

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_document(&body)
    }
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        Error::Transport(err)
    }
}

/// Resolve `<base>/customState.json`, tolerating a missing trailing slash.
fn state_document_url(base_url: &Url) -> Result<Url, Error> {
    if base_url.path().ends_with(STATE_DOCUMENT) {
        return Ok(base_url.clone());
    }
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(STATE_DOCUMENT)?)
}
