//! Fallback for platforms without keypress or process signals.

use super::{KeypressCounter, ProcessLister, SignalError};

/// Signal source that reports every read as unsupported.
///
/// Only the manual override can make the user busy here.
#[derive(Debug, Default, Clone)]
pub struct SystemSignals;

impl SystemSignals {
    pub fn new() -> Self {
        Self
    }
}

impl KeypressCounter for SystemSignals {
    fn keypress_count(&self) -> Result<u64, SignalError> {
        Err(SignalError::Unsupported)
    }
}

impl ProcessLister for SystemSignals {
    fn process_names(&self) -> Result<Vec<String>, SignalError> {
        Err(SignalError::Unsupported)
    }
}
