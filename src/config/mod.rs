// src/config/mod.rs

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, default_config_path, load_and_validate};
pub use model::{ConfigFile, RawConfigFile, TaskConfig};
