//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and the core crate, with the HTTP stack kept at `warn`.

use tracing_subscriber::EnvFilter;

pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pareto_compare={level},pareto_core={level},tower_http=warn,hyper=warn,sqlx=warn"
        ))
    });

    // A second init (e.g. several commands in one test process) is not an error.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
