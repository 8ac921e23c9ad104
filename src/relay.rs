use crate::config::MetricSource;
use crate::fetcher::fetch;
use crate::pusher::{push, push_url};
use reqwest::Client;
use std::future::Future;
use tracing::{error, info};
use url::Url;

/// One unit of work of the scheduler: move the metrics of a single source to
/// the Pushgateway.
///
/// A relay has no error channel. Whatever goes wrong is logged and the metrics
/// of that source are simply missing for one tick.
pub trait Relay: Send + Sync + 'static {
    fn relay(&self, source: &MetricSource) -> impl Future<Output = ()> + Send;
}

/// Fetches a source over HTTP and pushes the payload to the Pushgateway,
/// labelled with `instance`.
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: Client,
    gateway_url: Url,
    instance: String,
}

impl HttpRelay {
    pub fn new(client: Client, gateway_url: Url, instance: impl Into<String>) -> Self {
        Self {
            client,
            gateway_url,
            instance: instance.into(),
        }
    }
}

impl Relay for HttpRelay {
    async fn relay(&self, source: &MetricSource) {
        let payload = match fetch(&self.client, &source.url).await {
            Ok(payload) => payload,
            Err(err) => {
                error!(job = %source.name, ?err, "Unable to fetch metrics, skipping push");
                return;
            }
        };

        let url = match push_url(&self.gateway_url, &source.name, &self.instance) {
            Ok(url) => url,
            Err(err) => {
                error!(job = %source.name, ?err, "Unable to build pushgateway url");
                return;
            }
        };

        info!(job = %source.name, endpoint = %url, bytes = payload.len(), "Pushing metrics");

        if let Err(err) = push(&self.client, &url, payload).await {
            error!(job = %source.name, ?err, "Unable to push metrics");
        }
    }
}
