//! # Node Runtime Library
//!
//! Configuration loading and wiring for the development node. The entry
//! point is the `main.rs` binary; the library exists so the wiring can be
//! tested.

pub mod config;
pub mod node;

pub use config::{apply_env_overrides, load_config, read_config_file, NodeConfig};
pub use node::{DevNode, NodeHandles};
