//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output always; when the config carries a `log_path`, a second
//! daily-rotated file layer is added whose files are prefixed with the
//! account user, so one directory can hold several accounts' logs side by
//! side.

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

/// Initialize the global tracing subscriber from the loaded config.
///
/// `log_level` is the default if `RUST_LOG` is not set. The log directory is
/// created if missing. Fails if a global subscriber is already installed.
pub fn init_logging(config: &AppConfig, log_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(true);

    let file_layer = match config.log_path.as_deref() {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {dir}"))?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("ft-{}", config.account.user));
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;
    Ok(())
}
