//! Logging setup.
//!
//! `tracing` events go to stderr through a `tracing-subscriber` fmt layer.
//! The filter comes from `[logging].level` in the config file unless the
//! `RUST_LOG` environment variable is set:
//!
//! ```bash
//! RUST_LOG=debug docchat serve
//! RUST_LOG=docchat_core=debug,docchat=info docchat ask "..."
//! ```

use std::sync::Once;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Install the global subscriber. Only the first call takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(&config.level)
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}
