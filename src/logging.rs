use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize the process-wide tracing subscriber.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("shardmesh=debug,tower_http=info")
        } else {
            EnvFilter::new("shardmesh=info,tower_http=warn")
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;

    info!("shardmesh logging initialized");
    Ok(())
}

/// Initialize logging, falling back to a warning on stderr if setup fails
/// (e.g. a subscriber is already installed by the test harness).
pub fn init_logging_safe() {
    if let Err(e) = init_logging() {
        eprintln!("warning: failed to set up structured logging: {e}");
    }
}
