use crate::parser::{gateway_parser, source_url, EndpointError};
use crate::pusher::{check_label, PushError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Name of the section that holds the global settings. It is never treated as
/// a metric source.
pub const GLOBAL_SECTION: &str = "config";

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:9091";
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(60);
/// Longest accepted push interval, one year.
pub const MAX_PUSH_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PATH: &str = "/metrics";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read configuration from {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to parse configuration file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("section [{section}] in {} is malformed", .path.display())]
    Section {
        section: String,
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("metric section name {section:?} cannot be used as a job label")]
    InvalidSectionName {
        section: String,
        #[source]
        source: PushError,
    },

    #[error("port is not defined for metric source [{section}]")]
    MissingPort { section: String },

    #[error("port {port} of metric source [{section}] is out of range")]
    InvalidPort { section: String, port: i64 },

    #[error("push interval must be greater than zero and at most one year")]
    InvalidInterval,

    #[error("invalid pushgateway url")]
    InvalidGatewayUrl(#[source] EndpointError),

    #[error("invalid url for metric source [{section}]")]
    InvalidSourceUrl {
        section: String,
        #[source]
        source: EndpointError,
    },
}

/// The resolved configuration of the pusher. It is created once at startup
/// and never changes afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PusherConfig {
    /// Base address of the Pushgateway.
    pub gateway_url: Url,

    /// How often every metric source is relayed.
    #[serde(with = "humantime_serde")]
    pub push_interval: Duration,

    /// The metric sources, in the order they were first declared.
    pub sources: Vec<MetricSource>,
}

/// A named, fully resolved scrape target. The name is used as the `job` label
/// on the Pushgateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSource {
    pub name: String,
    pub url: Url,
}

impl MetricSource {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
        }
    }
}

/// `push_interval` is either a number of seconds or a humantime string such as
/// `"30s"` or `"2m"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PushInterval {
    Seconds(i64),
    Human(#[serde(with = "humantime_serde")] Duration),
}

impl PushInterval {
    fn to_duration(self) -> Result<Duration, ConfigError> {
        let duration = match self {
            PushInterval::Seconds(secs) if secs > 0 => Duration::from_secs(secs as u64),
            PushInterval::Seconds(_) => return Err(ConfigError::InvalidInterval),
            PushInterval::Human(duration) => duration,
        };

        if duration.is_zero() || duration > MAX_PUSH_INTERVAL {
            return Err(ConfigError::InvalidInterval);
        }

        Ok(duration)
    }
}

/// The `[config]` section as it appears in a file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GlobalSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushgateway_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_interval: Option<PushInterval>,

    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

/// A metric source section as it appears in a file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,

    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

impl GlobalSection {
    pub fn new(pushgateway_url: Option<String>, push_interval: Option<PushInterval>) -> Self {
        Self {
            pushgateway_url,
            push_interval,
            unknown: BTreeMap::new(),
        }
    }
}

impl SourceSection {
    pub fn new(host: Option<String>, port: u16, path: Option<String>, ssl: Option<bool>) -> Self {
        Self {
            host,
            port: Some(i64::from(port)),
            path,
            ssl,
            unknown: BTreeMap::new(),
        }
    }
}

impl PusherConfig {
    /// Load the configuration from a file, or from every regular file inside
    /// a directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::default();

        for file in config_files(path.as_ref())? {
            debug!(path = %file.display(), "Loading configuration file");

            let contents = fs::read_to_string(&file).map_err(|source| ConfigError::Io {
                path: file.clone(),
                source,
            })?;
            builder.merge_str(&contents, &file)?;
        }

        builder.build()
    }

    /// Build a configuration from a single TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::default();
        builder.merge_str(contents, Path::new("<inline>"))?;
        builder.build()
    }
}

/// Returns the configuration files behind `path`. A directory yields all of
/// its regular files sorted by name, anything else is returned as-is.
pub fn config_files(path: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_owned(),
        source,
    };

    let metadata = fs::metadata(path).map_err(io_err)?;
    if !metadata.is_dir() {
        return Ok(vec![path.to_owned()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    if files.is_empty() {
        warn!(path = %path.display(), "Configuration directory contains no files");
    }

    Ok(files)
}

/// Accumulates sections from one or more files. For every field of every
/// section the first value seen wins.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    global: GlobalSection,
    sources: Vec<(String, SourceSection)>,
}

impl ConfigBuilder {
    /// Merge one TOML document into the builder. `origin` is only used for
    /// error messages and logging.
    pub fn merge_str(&mut self, contents: &str, origin: &Path) -> Result<(), ConfigError> {
        let table: toml::Table = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_owned(),
            source,
        })?;

        for (name, value) in table {
            if !value.is_table() {
                warn!(
                    key = %name,
                    origin = %origin.display(),
                    "Ignoring top-level key that is not a section"
                );
                continue;
            }

            let section_err = |source| ConfigError::Section {
                section: name.clone(),
                path: origin.to_owned(),
                source,
            };

            if name == GLOBAL_SECTION {
                let section: GlobalSection = value.try_into().map_err(section_err)?;
                self.merge_global(section, origin);
            } else {
                let section: SourceSection = value.try_into().map_err(section_err)?;
                self.merge_source(name, section, origin);
            }
        }

        Ok(())
    }

    fn merge_global(&mut self, incoming: GlobalSection, origin: &Path) {
        warn_unknown(GLOBAL_SECTION, &incoming.unknown);

        let current = &mut self.global;
        merge_field(
            GLOBAL_SECTION,
            "pushgateway_url",
            &mut current.pushgateway_url,
            incoming.pushgateway_url,
            origin,
        );
        merge_field(
            GLOBAL_SECTION,
            "push_interval",
            &mut current.push_interval,
            incoming.push_interval,
            origin,
        );
    }

    fn merge_source(&mut self, name: String, incoming: SourceSection, origin: &Path) {
        warn_unknown(&name, &incoming.unknown);

        let index = match self.sources.iter().position(|(existing, _)| *existing == name) {
            Some(index) => index,
            None => {
                self.sources.push((name, SourceSection::default()));
                self.sources.len() - 1
            }
        };

        let (name, current) = &mut self.sources[index];
        merge_field(name, "host", &mut current.host, incoming.host, origin);
        merge_field(name, "port", &mut current.port, incoming.port, origin);
        merge_field(name, "path", &mut current.path, incoming.path, origin);
        merge_field(name, "ssl", &mut current.ssl, incoming.ssl, origin);
    }

    /// Validate everything that was merged and resolve it into a
    /// [`PusherConfig`].
    pub fn build(self) -> Result<PusherConfig, ConfigError> {
        let gateway_url = gateway_parser(
            self.global
                .pushgateway_url
                .as_deref()
                .unwrap_or(DEFAULT_GATEWAY_URL),
        )
        .map_err(ConfigError::InvalidGatewayUrl)?;

        let push_interval = match self.global.push_interval {
            Some(interval) => interval.to_duration()?,
            None => DEFAULT_PUSH_INTERVAL,
        };

        let sources = self
            .sources
            .into_iter()
            .map(|(name, section)| resolve_source(name, section))
            .collect::<Result<Vec<_>, _>>()?;

        if sources.is_empty() {
            warn!("No metric sources configured");
        }

        Ok(PusherConfig {
            gateway_url,
            push_interval,
            sources,
        })
    }
}

fn resolve_source(name: String, section: SourceSection) -> Result<MetricSource, ConfigError> {
    if let Err(source) = check_label("job", &name) {
        return Err(ConfigError::InvalidSectionName {
            section: name,
            source,
        });
    }

    let port = section.port.ok_or_else(|| ConfigError::MissingPort {
        section: name.clone(),
    })?;
    let port = u16::try_from(port)
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| ConfigError::InvalidPort {
            section: name.clone(),
            port,
        })?;

    let url = source_url(
        section.ssl.unwrap_or(false),
        section.host.as_deref().unwrap_or(DEFAULT_HOST),
        port,
        section.path.as_deref().unwrap_or(DEFAULT_PATH),
    )
    .map_err(|source| ConfigError::InvalidSourceUrl {
        section: name.clone(),
        source,
    })?;

    Ok(MetricSource { name, url })
}

fn merge_field<T>(
    section: &str,
    field: &str,
    current: &mut Option<T>,
    incoming: Option<T>,
    origin: &Path,
) {
    let Some(value) = incoming else {
        return;
    };

    if current.is_some() {
        warn!(
            config_section = section,
            field,
            origin = %origin.display(),
            "Field already set by an earlier file, ignoring"
        );
    } else {
        *current = Some(value);
    }
}

fn warn_unknown(section: &str, unknown: &BTreeMap<String, toml::Value>) {
    for field in unknown.keys() {
        warn!(config_section = section, field = %field, "Unknown configuration field");
    }
}
