//! Configuration module.
//!
//! Provides `RxConfig` (top-level settings), sub-configs for capture and the
//! decoder handshake, `AppPaths` for cross-platform data directories, and
//! TOML persistence via `RxConfig::load` / `RxConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AudioConfig, DecoderConfig, RxConfig};
