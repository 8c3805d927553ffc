//! Tracing subscriber setup.
//!
//! - `LOG_LEVEL` holds the filter directives (for example
//!   `"debug"` or `"info,challenge=debug,persistence=warn"`).
//! - `LOG_FORMAT=json` switches to JSON lines; anything else prints plain text.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,challenge=debug,persistence=debug,recommendation=debug";

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    // Logs go to stderr so command output on stdout stays clean.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
