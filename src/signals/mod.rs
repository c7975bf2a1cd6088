//! OS signal sources with platform-specific implementations.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod unsupported;

use thiserror::Error;

/// Failure to read an OS signal.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("signal unavailable: {0}")]
    Unavailable(String),
    #[error("not supported on this platform")]
    Unsupported,
}

/// Source of the system-wide keypress counter.
pub trait KeypressCounter {
    /// Current value of the counter. Only deltas between reads are meaningful.
    fn keypress_count(&self) -> Result<u64, SignalError>;
}

/// Source of running process names.
pub trait ProcessLister {
    /// Names of the processes running right now.
    ///
    /// Entries that disappear while being scanned are skipped.
    fn process_names(&self) -> Result<Vec<String>, SignalError>;
}

#[cfg(target_os = "linux")]
pub use linux::SystemSignals;
#[cfg(target_os = "macos")]
pub use macos::SystemSignals;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub use unsupported::SystemSignals;
