use tracing::{debug, info, warn};

use crate::signals::SignalError;

/// Tracks whether a signal source is currently failing, so a persistent
/// failure is reported at `warn` once and at `debug` on every later cycle.
#[derive(Debug)]
pub struct ReadFailures {
    source: &'static str,
    failing: bool,
}

impl ReadFailures {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            failing: false,
        }
    }

    pub fn is_failing(&self) -> bool {
        self.failing
    }

    pub fn failed(&mut self, err: &SignalError) {
        if self.failing {
            debug!("Still unable to read {}: {}", self.source, err);
        } else {
            warn!("Failed to read {}: {}", self.source, err);
            self.failing = true;
        }
    }

    pub fn succeeded(&mut self) {
        if self.failing {
            info!("Reading {} again", self.source);
            self.failing = false;
        }
    }
}
