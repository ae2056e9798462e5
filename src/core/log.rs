use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber. Logs go to stderr so conversion results
/// on stdout stay pipeable. `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool) {
    let (app_level, default_directive) = if verbose {
        (LevelFilter::DEBUG, "convbuddy=debug")
    } else {
        (LevelFilter::ERROR, "convbuddy=error")
    };
    let app_filter = Targets::new()
        .with_target("convbuddy", app_level)
        .with_default(LevelFilter::WARN);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(app_filter)
        .with(env_filter)
        .init();
}
