//! # covrt Agent Configuration
//!
//! Options for the collection agent and the ambient process setup every
//! embedding needs.
//!
//! ## Features
//!
//! - **Agent Options**: output mode, addresses, destination file, session id
//! - **Option Strings**: `output=tcpserver,port=6300` parsing and formatting
//! - **Layered Loading**: TOML file and `COVRT_*` environment overrides
//! - **Logging**: `tracing` subscriber setup
//!
//! ## Usage
//!
//! ```rust
//! use agent_config::{AgentOptions, OutputMode};
//!
//! let options: AgentOptions = "output=tcpserver,port=6300".parse().unwrap();
//! assert_eq!(options.output, OutputMode::TcpServer);
//! ```

pub mod loader;
pub mod logging;
pub mod options;

pub use loader::{load_options, load_with_overrides};
pub use logging::{init_logging, init_test_logging};
pub use options::{AgentOptions, ConfigError, OutputMode, DEFAULT_PORT};
