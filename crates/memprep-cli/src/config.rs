mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_prepare_config, build_run_config};
pub use models::{FetchSettings, FetchSource, PrepareConfig, RunConfig};
