//! Session tunables.
//!
//! Defaults suit a server on the same host. `SessionConfig::load` layers a
//! config file and `ACTIVEFTP_*` environment variables on top of them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::Deserialize;

use super::types::{FtpError, Result};

/// Milliseconds to wait for the server to open the data connection.
pub const DEFAULT_ACCEPT_TIMEOUT_MS: u64 = 20_000;

/// Bytes moved per read/write on the data connection.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Local port the data listener binds. 0 picks a free port.
    pub data_port: u16,

    /// Bound on accepting the inbound data connection, in milliseconds.
    pub accept_timeout_ms: u64,

    pub chunk_size: usize,

    /// Directory that local file names in `get`/`put` resolve against.
    pub local_root: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            data_port: 0,
            accept_timeout_ms: DEFAULT_ACCEPT_TIMEOUT_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            local_root: PathBuf::from("."),
        }
    }
}

impl SessionConfig {
    /// Loads `path` (any format the `config` crate detects from the
    /// extension) with `ACTIVEFTP_DATA_PORT` style environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_str().ok_or_else(|| {
            FtpError::Config(format!("non UTF-8 config path: {}", path.as_ref().display()))
        })?;

        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("ACTIVEFTP").try_parsing(true))
            .build()?;

        let config: SessionConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(FtpError::Config("chunk_size must be greater than 0".into()));
        }
        if self.accept_timeout_ms == 0 {
            return Err(FtpError::Config(
                "accept_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn with_data_port(mut self, port: u16) -> Self {
        self.data_port = port;
        self
    }

    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_local_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.local_root = root.into();
        self
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub(crate) fn local_path(&self, name: &str) -> PathBuf {
        self.local_root.join(name)
    }
}
