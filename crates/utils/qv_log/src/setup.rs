//! Function to set up logging in binaries and tests.

/// Directs [`log`] calls to stderr. Safe to call more than once.
///
/// The filter is read from `RUST_LOG`, defaulting to `info`.
pub fn setup_logging() {
    fn setup() {
        if cfg!(debug_assertions) && std::env::var("RUST_BACKTRACE").is_err() {
            // In debug builds, produce backtraces when a worker panics unless
            // the user asked for something else.
            std::env::set_var("RUST_BACKTRACE", "1");
        }

        let mut builder = env_logger::Builder::new();
        builder.parse_filters(
            &std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned()),
        );
        if builder.try_init().is_err() {
            crate::warn!("logger was already initialized by someone else");
        }
    }

    use std::sync::Once;
    static START: Once = Once::new();
    START.call_once(setup);
}
