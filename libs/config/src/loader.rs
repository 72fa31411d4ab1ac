//! Agent configuration loading
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. `COVRT_*` environment variables (e.g. `COVRT_OUTPUT=tcpserver`)
//! 4. An option string (`key=value,key=value`)

use crate::options::AgentOptions;
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use std::path::Path;
use tracing::{debug, info};

/// Environment variable prefix for agent options
pub const ENV_PREFIX: &str = "COVRT";

/// Load options from an optional file and the environment
pub fn load_options(path: Option<&Path>) -> Result<AgentOptions> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        info!("Loading agent config: {:?}", path);
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

    let config = builder.build().context("Failed to build agent configuration")?;
    let options: AgentOptions = config
        .try_deserialize()
        .context("Failed to deserialize agent configuration")?;
    debug!(%options, "agent options loaded");
    Ok(options)
}

/// Load options and apply an option string on top
pub fn load_with_overrides(path: Option<&Path>, option_string: &str) -> Result<AgentOptions> {
    let mut options = load_options(path)?;
    options
        .apply(option_string)
        .with_context(|| format!("Invalid agent options \"{option_string}\""))?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OutputMode;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        fs::write(
            &path,
            r#"
output = "tcpclient"
address = "collector.local"
port = 7100
append = false
retry_count = 3
"#,
        )
        .unwrap();

        let options = load_options(Some(&path)).unwrap();
        assert_eq!(options.output, OutputMode::TcpClient);
        assert_eq!(options.connect_address(), "collector.local");
        assert_eq!(options.port, 7100);
        assert!(!options.append);
        assert_eq!(options.retry_count, 3);
        // Untouched keys keep their defaults
        assert_eq!(options.destfile, PathBuf::from("coverage.exec"));
        assert!(options.dumponexit);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(load_options(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_option_string_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        fs::write(&path, "port = 7100\njmx = true\n").unwrap();

        let options = load_with_overrides(Some(&path), "port=7200").unwrap();
        assert_eq!(options.port, 7200);
        assert!(options.jmx);

        let err = load_with_overrides(Some(&path), "port=x").unwrap_err();
        assert!(err.to_string().contains("port=x"));
    }
}
