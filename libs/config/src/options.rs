//! Agent Options
//!
//! Typed agent configuration plus the compact option string form
//! `key=value,key=value` used on command lines and in launcher scripts.
//! Values can never contain a comma.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default TCP port for the server and client outputs
pub const DEFAULT_PORT: u16 = 6300;

/// Default execution data file
pub const DEFAULT_DESTFILE: &str = "coverage.exec";

/// Default number of connection attempts for retrying clients
pub const DEFAULT_RETRY_COUNT: u32 = 10;

/// Default initial delay between connection attempts
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Option keys in canonical order
pub const VALID_OPTIONS: [&str; 10] = [
    "destfile",
    "append",
    "sessionid",
    "dumponexit",
    "output",
    "address",
    "port",
    "jmx",
    "retrycount",
    "retrydelay",
];

/// Errors from parsing or setting agent options
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid agent option syntax \"{option}\"")]
    InvalidSyntax { option: String },

    #[error("Unknown agent option \"{key}\"")]
    UnknownOption { key: String },

    #[error("Invalid value \"{value}\" for option {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid character in option argument \"{value}\"")]
    InvalidCharacter { value: String },
}

impl ConfigError {
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// How collected execution data leaves the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Write to a local file
    #[default]
    File,
    /// Accept dump requests on a TCP port
    TcpServer,
    /// Push data to a collector over TCP
    TcpClient,
    /// Only in-process management access
    Management,
    /// Collect but never emit
    None,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::TcpServer => "tcpserver",
            Self::TcpClient => "tcpclient",
            Self::Management => "management",
            Self::None => "none",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "tcpserver" => Ok(Self::TcpServer),
            "tcpclient" => Ok(Self::TcpClient),
            "management" => Ok(Self::Management),
            "none" => Ok(Self::None),
            other => Err(ConfigError::invalid_value(
                "output",
                other,
                "expected one of file, tcpserver, tcpclient, management, none",
            )),
        }
    }
}

/// Complete agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentOptions {
    pub output: OutputMode,
    /// Bind address (server) or collector host (client)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub port: u16,
    pub destfile: PathBuf,
    pub append: bool,
    /// Session id; generated at startup when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessionid: Option<String>,
    pub dumponexit: bool,
    /// Register the management agent in addition to the output
    pub jmx: bool,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            output: OutputMode::File,
            address: None,
            port: DEFAULT_PORT,
            destfile: PathBuf::from(DEFAULT_DESTFILE),
            append: true,
            sessionid: None,
            dumponexit: true,
            jmx: false,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::invalid_value(key, value, "expected true or false")),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid_value(key, value, e.to_string()))
}

fn check_value(value: &str) -> Result<(), ConfigError> {
    if value.contains(',') {
        return Err(ConfigError::InvalidCharacter {
            value: value.to_string(),
        });
    }
    Ok(())
}

impl AgentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an option string on top of the current values
    ///
    /// An empty string changes nothing. The call is all-or-nothing: on error
    /// `self` is left as it was.
    pub fn apply(&mut self, options: &str) -> Result<(), ConfigError> {
        if options.is_empty() {
            return Ok(());
        }
        let mut updated = self.clone();
        for entry in options.split(',') {
            let (key, value) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidSyntax {
                option: options.to_string(),
            })?;
            updated.set(key, value)?;
        }
        *self = updated;
        Ok(())
    }

    /// Set a single option by key
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        check_value(value)?;
        match key {
            "destfile" => self.destfile = PathBuf::from(value),
            "append" => self.append = parse_bool(key, value)?,
            "sessionid" => self.sessionid = Some(value.to_string()),
            "dumponexit" => self.dumponexit = parse_bool(key, value)?,
            "output" => self.output = value.parse()?,
            "address" => self.address = Some(value.to_string()),
            "port" => self.port = parse_number(key, value)?,
            "jmx" => self.jmx = parse_bool(key, value)?,
            "retrycount" => self.retry_count = parse_number(key, value)?,
            "retrydelay" => self.retry_delay_ms = parse_number(key, value)?,
            _ => {
                return Err(ConfigError::UnknownOption {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Current value of an option in string form, `None` if unset
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "destfile" => Some(self.destfile.display().to_string()),
            "append" => Some(self.append.to_string()),
            "sessionid" => self.sessionid.clone(),
            "dumponexit" => Some(self.dumponexit.to_string()),
            "output" => Some(self.output.to_string()),
            "address" => self.address.clone(),
            "port" => Some(self.port.to_string()),
            "jmx" => Some(self.jmx.to_string()),
            "retrycount" => Some(self.retry_count.to_string()),
            "retrydelay" => Some(self.retry_delay_ms.to_string()),
            _ => None,
        }
    }

    pub fn set_destfile(&mut self, destfile: impl AsRef<Path>) -> Result<(), ConfigError> {
        let destfile = destfile.as_ref();
        check_value(&destfile.to_string_lossy())?;
        self.destfile = destfile.to_path_buf();
        Ok(())
    }

    pub fn set_address(&mut self, address: impl Into<String>) -> Result<(), ConfigError> {
        let address = address.into();
        check_value(&address)?;
        self.address = Some(address);
        Ok(())
    }

    pub fn set_session_id(&mut self, id: impl Into<String>) -> Result<(), ConfigError> {
        let id = id.into();
        check_value(&id)?;
        self.sessionid = Some(id);
        Ok(())
    }

    /// Address the TCP server binds to; `*` or unset means all interfaces
    pub fn bind_address(&self) -> &str {
        match self.address.as_deref() {
            None | Some("*") => "0.0.0.0",
            Some(address) => address,
        }
    }

    /// Collector host the TCP client connects to
    pub fn connect_address(&self) -> &str {
        self.address.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Serialize as TOML, e.g. to seed a configuration file
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

impl FromStr for AgentOptions {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = Self::default();
        options.apply(s)?;
        Ok(options)
    }
}

/// Option string containing every value that differs from the default
impl fmt::Display for AgentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let defaults = Self::default();
        let mut first = true;
        for key in VALID_OPTIONS {
            let value = self.get(key);
            if value.is_none() || value == defaults.get(key) {
                continue;
            }
            if let Some(value) = value {
                if !first {
                    f.write_str(",")?;
                }
                write!(f, "{key}={value}")?;
                first = false;
            }
        }
        Ok(())
    }
}
