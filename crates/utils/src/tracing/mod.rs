use jobd_core::constants::JOBD_LOG_VAR;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use ::tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing system
///
/// The filter comes from `JOBD_LOG`, then `RUST_LOG`, then defaults to
/// `info`. Diagnostics always go to stderr so that stdout stays reserved for
/// the server's protocol log.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = build_filter();
    let ansi = is_tty();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn build_filter() -> EnvFilter {
    std::env::var(JOBD_LOG_VAR)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Span covering one client connection
pub fn client_span(client_id: u64) -> Span {
    span!(Level::DEBUG, "client", client_id = %client_id)
}

/// Span covering work done on behalf of one job
pub fn job_span(pid: u32) -> Span {
    span!(Level::DEBUG, "job", pid = %pid)
}
