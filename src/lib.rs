//! Scrape metrics endpoints on a fixed interval and relay every payload to a
//! Prometheus Pushgateway, labelled with the job name and the instance it was
//! collected on.

pub mod config;
pub mod fetcher;
pub mod instance;
pub mod parser;
pub mod pusher;
pub mod relay;
pub mod scheduler;

#[cfg(test)]
mod test_util;

/// Create the reqwest client that is shared by every relay task. This allows
/// for keep-alives when the same source or gateway is contacted every tick.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("prometheus-pusher/", env!("CARGO_PKG_VERSION")))
        .build()
}
