use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::Error,
    protocol::{Drive, DEFAULT_SECTION_BYTES},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to (e.g. 0.0.0.0:11000)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// JSON file holding the user directory
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,

    /// Drives reported to clients instead of the detected ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drives: Option<Vec<Drive>>,

    /// Idle time after which an upload is abandoned
    #[serde(default = "default_write_session_timeout")]
    pub write_session_timeout_secs: u64,

    /// How often abandoned uploads are looked for
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Age at which the cached user list is reloaded
    #[serde(default = "default_user_cache_refresh")]
    pub user_cache_refresh_secs: u64,

    /// Responses buffered per connection before request handling waits
    #[serde(default = "default_response_channel_depth")]
    pub response_channel_depth: usize,
}

fn default_listen_addr() -> String {
    "0.0.0.0:11000".to_owned()
}
fn default_users_file() -> PathBuf {
    PathBuf::from("users.json")
}
fn default_write_session_timeout() -> u64 {
    300
}
fn default_sweep_interval() -> u64 {
    30
}
fn default_user_cache_refresh() -> u64 {
    300
}
fn default_response_channel_depth() -> usize {
    16
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            users_file: default_users_file(),
            drives: None,
            write_session_timeout_secs: default_write_session_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            user_cache_refresh_secs: default_user_cache_refresh(),
            response_channel_depth: default_response_channel_depth(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        load(path)
    }

    pub const fn write_session_timeout(&self) -> Duration {
        Duration::from_secs(self.write_session_timeout_secs)
    }

    /// Never shorter than one second
    pub const fn sweep_interval(&self) -> Duration {
        if self.sweep_interval_secs == 0 {
            return Duration::from_secs(1);
        }

        Duration::from_secs(self.sweep_interval_secs)
    }

    pub const fn user_cache_refresh(&self) -> Duration {
        Duration::from_secs(self.user_cache_refresh_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server address (e.g. 192.168.1.10:11000)
    pub remote_addr: String,

    pub security_key: String,

    /// Maximum wait for the complete response to one request
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,

    /// Bytes per section for uploads and downloads
    #[serde(default = "default_section_bytes")]
    pub section_bytes: u64,
}

fn default_response_timeout() -> u64 {
    30
}
fn default_section_bytes() -> u64 {
    DEFAULT_SECTION_BYTES
}

impl ClientConfig {
    pub fn new<A: Into<String>, K: Into<String>>(remote_addr: A, security_key: K) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            security_key: security_key.into(),
            response_timeout_secs: default_response_timeout(),
            section_bytes: default_section_bytes(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        load(path)
    }

    pub const fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

fn load<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    serde_json::from_str(&data)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}
