use tracing::Level;

/// Install a formatted tracing subscriber.
///
/// Returns `false` when a global subscriber was already installed, which makes
/// it safe to call from every test.
pub fn init_logging(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .is_ok()
}
