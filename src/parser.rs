use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("unable to parse endpoint {input}")]
    Parse {
        input: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported protocol {0}")]
    UnsupportedScheme(String),

    #[error("endpoint {0} has no host")]
    MissingHost(String),
}

/// Parses the input string into a gateway Url. This uses a custom parser to
/// allow for some more flexible input.
///
/// Parsing adheres to the following rules:
/// - The protocol should only allow for http and https, where http is the
///   default.
/// - A leading colon means `localhost`, so `:9091` is `http://localhost:9091`.
/// - The path is kept as-is; it is the prefix the push paths get appended to.
pub fn gateway_parser(input: &str) -> Result<Url, EndpointError> {
    let mut input = input.trim().to_owned();

    if input.starts_with(':') {
        // Prepend http://localhost if the input starts with a colon.
        input = format!("http://localhost{}", input);
    }

    // Prepend http:// if the input does not contain ://. This is a rather naive
    // check, but it should suffice for our purposes.
    if !input.contains("://") {
        input = format!("http://{}", input);
    }

    let url = Url::parse(&input).map_err(|source| EndpointError::Parse {
        input: input.clone(),
        source,
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(EndpointError::UnsupportedScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(EndpointError::MissingHost(input));
    }

    Ok(url)
}

/// Assemble the address of a metric source from its parts.
///
/// `path` gets a leading slash if it is missing, so `metrics` and `/metrics`
/// are equivalent. IPv6 hosts may be given with or without brackets.
pub fn source_url(ssl: bool, host: &str, port: u16, path: &str) -> Result<Url, EndpointError> {
    let scheme = if ssl { "https" } else { "http" };
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    };
    let input = if path.starts_with('/') {
        format!("{scheme}://{host}:{port}{path}")
    } else {
        format!("{scheme}://{host}:{port}/{path}")
    };

    let url = Url::parse(&input).map_err(|source| EndpointError::Parse {
        input: input.clone(),
        source,
    })?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(EndpointError::MissingHost(input));
    }

    Ok(url)
}
