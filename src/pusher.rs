use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("{label} label {value:?} cannot be used as a path segment")]
    InvalidLabel { label: &'static str, value: String },

    #[error("pushgateway url {0} cannot be used as a base url")]
    CannotBeABase(Url),

    #[error("push to {url} failed")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("pushgateway at {url} responded with status {status}")]
    Status { url: Url, status: StatusCode },
}

/// Build the Pushgateway address for a `job`/`instance` pair:
/// `{gateway}/metrics/job/{job}/instance/{instance}`.
///
/// Both labels are appended as single, percent-encoded path segments, so a
/// label that contains `/`, `?` or `#` cannot change which grouping key is
/// written to.
pub fn push_url(gateway: &Url, job: &str, instance: &str) -> Result<Url, PushError> {
    check_label("job", job)?;
    check_label("instance", instance)?;

    let mut url = gateway.clone();
    url.set_query(None);
    url.set_fragment(None);

    url.path_segments_mut()
        .map_err(|_| PushError::CannotBeABase(gateway.clone()))?
        .pop_if_empty()
        .extend(["metrics", "job", job, "instance", instance]);

    Ok(url)
}

/// Check that `value` can be used as the `label` segment of a push url.
///
/// Empty labels are rejected, as are `.` and `..` which the url crate drops
/// when they are used as segments.
pub fn check_label(label: &'static str, value: &str) -> Result<(), PushError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(PushError::InvalidLabel {
            label,
            value: value.to_owned(),
        });
    }

    Ok(())
}

/// Submit `payload` to the Pushgateway at `url` as `text/plain`.
pub async fn push(client: &Client, url: &Url, payload: Vec<u8>) -> Result<(), PushError> {
    let response = client
        .post(url.clone())
        .header(CONTENT_TYPE, "text/plain")
        .body(payload)
        .send()
        .await
        .map_err(|source| PushError::Request {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PushError::Status {
            url: url.clone(),
            status,
        });
    }

    debug!(endpoint = %url, %status, "Pushed metrics");
    Ok(())
}
