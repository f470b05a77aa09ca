//! Configuration for the opening book generator.
//!
//! Configuration is loaded from `genbook.toml` with environment variable
//! overrides (`GENBOOK_<SECTION>_<KEY>`). CLI arguments take highest
//! priority, followed by env vars, then the config file.

pub mod defaults;
mod loader;
mod structs;

#[cfg(test)]
mod tests;

pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::{BookSection, CommonSection, CostSection, GenbookConfig, SearchSection};
