//! Logger initialization.
//!
//! The crate only talks to the `log` facade. Binaries that embed the renderer
//! call [`init_logging`] once at startup to install `env_logger`.

use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` uses the `env_logger` filter syntax (e.g. `"info"` or
/// `"forward_core=debug,wgpu=warn"`). When unset, `RUST_LOG` is used, then `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global logger. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }
        builder.write_style(config.write_style);

        if let Err(e) = builder.try_init() {
            println!("Warning: Could not initialize logger: {}", e);
            return;
        }
        log::debug!("logging initialized");
    });
}
