//! csv-query command line: config, logging, table output, and the REPL.

pub mod config;
pub mod logging;
pub mod presenter;
pub mod repl;
pub mod session;

pub use config::{resolve_config_path, Config, ConfigError, Overrides};
pub use logging::LogGuard;
pub use presenter::render_table;
pub use session::{run_interruptible, QueryReport};
