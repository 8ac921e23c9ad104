use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status { url: Url, status: StatusCode },
}

/// Retrieve the metrics exposed at `url`.
///
/// The body is returned as-is, it is neither parsed nor checked against its
/// content type. Anything but a 2xx response is treated as a failure so that an
/// error page never ends up on the Pushgateway.
pub async fn fetch(client: &Client, url: &Url) -> Result<Vec<u8>, FetchError> {
    info!(url = %url, "Fetching metrics");

    let request_err = |source| FetchError::Request {
        url: url.clone(),
        source,
    };

    let response = client.get(url.clone()).send().await.map_err(request_err)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.clone(),
            status,
        });
    }

    let body = response.bytes().await.map_err(request_err)?;
    debug!(url = %url, bytes = body.len(), "Fetched metrics");

    Ok(body.to_vec())
}
