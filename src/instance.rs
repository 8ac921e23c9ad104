use crate::pusher::{check_label, PushError};
use std::io;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("unable to determine the hostname")]
    Hostname(#[source] io::Error),

    #[error("hostname is not valid unicode")]
    NotUnicode,

    #[error("instance name must not be empty")]
    Empty,

    #[error("instance name {0:?} cannot be used as an instance label")]
    InvalidLabel(String, #[source] PushError),
}

/// Resolve the value of the `instance` label. An explicitly configured name
/// takes precedence over the fully qualified name of this machine.
pub fn resolve_instance(explicit: Option<&str>) -> Result<String, InstanceError> {
    let name = match explicit {
        Some(name) => name.trim().to_owned(),
        None => fully_qualified(
            hostname::get()
                .map_err(InstanceError::Hostname)?
                .into_string()
                .map_err(|_| InstanceError::NotUnicode)?,
        ),
    };

    if name.is_empty() {
        return Err(InstanceError::Empty);
    }

    if let Err(err) = check_label("instance", &name) {
        return Err(InstanceError::InvalidLabel(name, err));
    }

    Ok(name)
}

/// The canonical name of `hostname` according to the resolver, or `hostname`
/// itself when it cannot be resolved.
fn fully_qualified(hostname: String) -> String {
    match canonical_name(&hostname) {
        Some(fqdn) => fqdn,
        None => {
            debug!(%hostname, "No canonical name found, using the plain hostname");
            hostname
        }
    }
}

#[cfg(unix)]
fn canonical_name(hostname: &str) -> Option<String> {
    use dns_lookup::{getaddrinfo, AddrInfoHints};

    let hints = AddrInfoHints {
        flags: libc::AI_CANONNAME,
        ..AddrInfoHints::default()
    };

    let addrs = match getaddrinfo(Some(hostname), None, Some(hints)) {
        Ok(addrs) => addrs,
        Err(err) => {
            debug!(%hostname, ?err, "Canonical name lookup failed");
            return None;
        }
    };

    addrs
        .filter_map(Result::ok)
        .find_map(|addr| addr.canonname)
        .filter(|name| !name.is_empty())
}

#[cfg(not(unix))]
fn canonical_name(_hostname: &str) -> Option<String> {
    None
}
