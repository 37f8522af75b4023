use std::io;

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn setup_logging(verbose_level: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let filter_str = match verbose_level {
            0 => "warn,code_companion=info",
            1 => "info,code_companion=debug",
            _ => "debug,code_companion=trace",
        };
        tracing_subscriber::EnvFilter::new(filter_str)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_writer(io::stderr)
        .init();
}
