//! Configuration types for cds-extract

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Export behavior configuration (paging, traversal root, archive layout)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum number of entries requested per Browse call (default: 10)
    ///
    /// Small pages bound the payload of each call and give the traversal
    /// frequent cancellation and progress points.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Container id the traversal starts from (default: "0", the CDS root)
    #[serde(default = "default_root_id")]
    pub root_id: String,

    /// Browse filter argument (default: "*")
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Browse sort criteria argument (default: empty)
    #[serde(default)]
    pub sort_criteria: String,

    /// Archive directory holding device and service descriptions (default: "description")
    #[serde(default = "default_description_dir")]
    pub description_dir: String,

    /// Archive directory holding raw listing pages (default: "cds")
    #[serde(default = "default_cds_dir")]
    pub cds_dir: String,

    /// Extension appended to every archive entry (default: ".xml")
    #[serde(default = "default_entry_extension")]
    pub entry_extension: String,

    /// Upper bound on `$n` collision suffixes tried per path (default: u32::MAX)
    #[serde(default = "default_max_collision_probes")]
    pub max_collision_probes: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            root_id: default_root_id(),
            filter: default_filter(),
            sort_criteria: String::new(),
            description_dir: default_description_dir(),
            cds_dir: default_cds_dir(),
            entry_extension: default_entry_extension(),
            max_collision_probes: default_max_collision_probes(),
        }
    }
}

/// HTTP settings for talking to the media server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for each HTTP request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Main configuration for [`Exporter`](crate::Exporter)
///
/// - [`export`](ExportConfig): paging and archive layout
/// - [`http`](HttpConfig): HTTP client settings used by [`MediaServer::connect`](crate::MediaServer::connect)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Export behavior
    #[serde(default)]
    pub export: ExportConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Parse a JSON configuration document and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Check settings that serde cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.export.chunk_size == 0 {
            return Err(invalid("chunk_size must be at least 1", "chunk_size"));
        }
        if self.export.root_id.is_empty() {
            return Err(invalid("root_id must not be empty", "root_id"));
        }
        if self.export.description_dir.is_empty() {
            return Err(invalid(
                "description_dir must not be empty",
                "description_dir",
            ));
        }
        if self.export.cds_dir.is_empty() {
            return Err(invalid("cds_dir must not be empty", "cds_dir"));
        }
        if self.export.max_collision_probes == 0 {
            return Err(invalid(
                "max_collision_probes must be at least 1",
                "max_collision_probes",
            ));
        }
        Ok(())
    }
}

fn invalid(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

// Default value functions
fn default_chunk_size() -> u32 {
    10
}

fn default_root_id() -> String {
    "0".into()
}

fn default_filter() -> String {
    "*".into()
}

fn default_description_dir() -> String {
    "description".into()
}

fn default_cds_dir() -> String {
    "cds".into()
}

fn default_entry_extension() -> String {
    ".xml".into()
}

fn default_max_collision_probes() -> u32 {
    u32::MAX
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("cds-extract/{} UPnP/1.0", env!("CARGO_PKG_VERSION"))
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
