//! Environment layering for agent options
//!
//! Kept in its own test binary: it mutates process environment variables.

use agent_config::{load_options, load_with_overrides, OutputMode};
use std::env;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_environment_overrides_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.toml");
    fs::write(&path, "output = \"file\"\nport = 7100\n").unwrap();

    env::set_var("COVRT_OUTPUT", "tcpserver");
    env::set_var("COVRT_RETRY_COUNT", "2");

    let options = load_options(Some(&path)).unwrap();
    assert_eq!(options.output, OutputMode::TcpServer);
    assert_eq!(options.port, 7100);
    assert_eq!(options.retry_count, 2);

    // The option string is applied last
    let options = load_with_overrides(Some(&path), "output=none").unwrap();
    assert_eq!(options.output, OutputMode::None);

    env::remove_var("COVRT_OUTPUT");
    env::remove_var("COVRT_RETRY_COUNT");
}
