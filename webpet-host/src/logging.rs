//! Log subscriber setup.

use tracing_subscriber::EnvFilter;
use webpet_core::config::GeneralConfig;

use crate::error::{HostError, Result};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `general.log_level` applies.
/// `general.log_format = "json"` switches to JSON lines.
///
/// # Errors
/// [`HostError::Logging`] for a bad filter or if a subscriber is already installed.
pub fn init(general: &GeneralConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&general.log_level)
            .map_err(|e| HostError::Logging(e.to_string()))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if general.log_format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| HostError::Logging(e.to_string()))
}
