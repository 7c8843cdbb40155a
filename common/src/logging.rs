use std::str::FromStr;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Initialize the global tracing subscriber.
///
/// `level` is a tracing env-filter expression. Calling this a second time is
/// a no-op so tests can initialize logging freely.
pub fn init(level: &str, json: bool) -> Result<()> {
    INITIALIZED.get_or_try_init(|| {
        let env_filter = EnvFilter::from_str(level)?;

        let builder = tracing_subscriber::fmt()
            .with_line_number(true)
            .with_file(true)
            .with_env_filter(env_filter);

        if json {
            builder.json().finish().try_init()
        } else {
            builder.finish().try_init()
        }
        .map_err(anyhow::Error::from)
    })?;

    Ok(())
}
