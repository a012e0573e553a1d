//! Debug logging utilities for guestsock.
//!
//! Set the `GUESTSOCK_DEBUG` environment variable to enable verbose logging:
//! - `GUESTSOCK_DEBUG=1` - Enable all debug output
//! - `GUESTSOCK_DEBUG=table` - Enable only descriptor table logs
//! - `GUESTSOCK_DEBUG=io` - Enable only per-call socket traffic logs
//! - `GUESTSOCK_DEBUG=table,io` - Enable multiple categories
//!
//! Output goes through the `log` facade, so a logger must be installed for
//! anything to appear. [`init_logging`] installs `env_logger`.

use std::sync::OnceLock;

#[doc(hidden)]
pub use log;

/// Log target for descriptor table events.
pub const TABLE_TARGET: &str = "guestsock::table";

/// Log target for socket traffic.
pub const IO_TARGET: &str = "guestsock::io";

/// Debug categories that can be enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCategory {
    Table,
    Io,
    All,
}

/// Cached debug configuration
static DEBUG_CONFIG: OnceLock<DebugConfig> = OnceLock::new();

#[derive(Debug, Default)]
struct DebugConfig {
    enabled: bool,
    table: bool,
    io: bool,
}

impl DebugConfig {
    fn from_env() -> Self {
        match std::env::var("GUESTSOCK_DEBUG") {
            Ok(val) => Self::parse(&val),
            Err(_) => Self::default(),
        }
    }

    fn parse(val: &str) -> Self {
        let val_lower = val.to_lowercase();
        if val_lower == "1" || val_lower == "all" {
            return Self {
                enabled: true,
                table: true,
                io: true,
            };
        }
        let table = val_lower.split(',').any(|c| c.trim() == "table");
        let io = val_lower.split(',').any(|c| c.trim() == "io");
        Self {
            enabled: table || io,
            table,
            io,
        }
    }
}

fn get_config() -> &'static DebugConfig {
    DEBUG_CONFIG.get_or_init(DebugConfig::from_env)
}

/// Check if debug logging is enabled for a category
pub fn is_debug_enabled(category: DebugCategory) -> bool {
    let config = get_config();
    if !config.enabled {
        return false;
    }
    match category {
        DebugCategory::All => config.table || config.io,
        DebugCategory::Table => config.table,
        DebugCategory::Io => config.io,
    }
}

/// Install `env_logger` as the global logger.
///
/// Defaults to `warn`; `RUST_LOG` overrides it. When `GUESTSOCK_DEBUG`
/// enables a category, its target is raised to `debug`. Safe to call more
/// than once.
pub fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if is_debug_enabled(DebugCategory::Table) {
        builder.filter_module(TABLE_TARGET, log::LevelFilter::Debug);
    }
    if is_debug_enabled(DebugCategory::Io) {
        builder.filter_module(IO_TARGET, log::LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

/// Debug log macro for descriptor table events
///
/// ```
/// guestsock::debug_table!("claimed slot {}", 3);
/// ```
#[macro_export]
macro_rules! debug_table {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled($crate::debug::DebugCategory::Table) {
            $crate::debug::log::debug!(target: $crate::debug::TABLE_TARGET, $($arg)*);
        }
    };
}

/// Debug log macro for socket traffic
///
/// ```
/// guestsock::debug_io!("send({}) -> {} bytes", 0, 4);
/// ```
#[macro_export]
macro_rules! debug_io {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled($crate::debug::DebugCategory::Io) {
            $crate::debug::log::debug!(target: $crate::debug::IO_TARGET, $($arg)*);
        }
    };
}
