//! Logging setup and device diagnostics.
//!
//! The library only emits through the `log` facade. Binaries and tests call
//! [`init_logging`] once to install `env_logger`.

mod init;

pub use init::{LoggingConfig, init_logging, log_device_summary};
