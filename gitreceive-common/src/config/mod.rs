//! Configuration system for gitreceive.
//!
//! This module provides:
//! - Environment variable parsing with type safety
//! - An optional TOML configuration file
//! - Source tracking for debugging

pub mod env;
pub mod gateway;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use gateway::{ConfigError, GatewayConfig, SYSTEM_CONFIG_PATH};
pub use source::{ConfigSource, Sourced};
