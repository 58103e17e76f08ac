//! Text logging for use in the quiver crates.
//!
//! * `trace`: spammy things
//! * `debug`: things that might be useful when debugging
//! * `info`: things that we want to show to users
//! * `warn`: problems that we can recover from
//! * `error`: problems that lead to loss of functionality or data
//!
//! The `warn_once` etc macros are for when you want to suppress repeated
//! logging of the exact same message.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

// The tracing macros support more syntax features than the log ones, that's why we use them:
pub use tracing::{debug, error, info, trace, warn};

pub use log_once::{debug_once, error_once, info_once, trace_once, warn_once};

pub use log::{Level, LevelFilter};

#[cfg(feature = "setup")]
mod setup;

#[cfg(feature = "setup")]
pub use setup::setup_logging;
