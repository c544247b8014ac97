use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose {
        "chess_vision_agent=debug,info"
    } else {
        "chess_vision_agent=info,warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber. `json` switches to one JSON object per
/// line for log shippers.
pub fn init_cli_logger(verbose: bool, json: bool) {
    let registry = tracing_subscriber::registry().with(filter(verbose));
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .json()
                    .with_current_span(false),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .init();
    }
}
