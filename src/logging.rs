//! Logging macro for the simulator.
//!
//! The library never installs a logger. Every record goes through the `log`
//! facade so the embedding application decides where output lands; the
//! `knx-sim` binary installs `tracing-subscriber` and its `log` bridge.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::sim_log;
//!
//! sim_log!(info, "Premise '{}' listening on {}", id, addr);
//! sim_log!(debug, "Received {} bytes", n);
//! sim_log!(warn, "Dropping malformed frame from {}", from);
//! sim_log!(error, "Socket closed: {}", err);
//! sim_log!(trace, "ACK ignored");
//! ```
//!
//! Records are emitted under the `knx_sim` target hierarchy, so
//! `RUST_LOG=knx_sim::knx_server=debug` narrows output to the tunnel server.

/// Unified logging macro for the crate.
///
/// Takes a level keyword followed by `format!`-style arguments.
#[macro_export]
macro_rules! sim_log {
    (info, $($arg:tt)*) => { ::log::info!($($arg)*) };
    (debug, $($arg:tt)*) => { ::log::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { ::log::warn!($($arg)*) };
    (error, $($arg:tt)*) => { ::log::error!($($arg)*) };
    (trace, $($arg:tt)*) => { ::log::trace!($($arg)*) };
}
