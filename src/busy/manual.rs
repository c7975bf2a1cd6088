//! Manual override: a single-slot hand-off from the control surface to the loop.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// What the user asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverrideMode {
    /// Infer busy state from the probes.
    #[default]
    Auto,
    /// Keep the light on until set back to auto.
    StayOn,
}

impl OverrideMode {
    pub fn is_stay_on(self) -> bool {
        self == OverrideMode::StayOn
    }
}

impl fmt::Display for OverrideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideMode::Auto => f.write_str("auto"),
            OverrideMode::StayOn => f.write_str("stay on"),
        }
    }
}

/// Holds the latest instruction not yet seen by the loop.
///
/// Writing replaces any pending instruction; reading empties the slot.
#[derive(Debug, Default)]
pub struct OverrideSlot {
    pending: Mutex<Option<OverrideMode>>,
}

impl OverrideSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new instruction, replacing one that was not consumed yet.
    pub fn set(&self, mode: OverrideMode) {
        *self.lock() = Some(mode);
    }

    /// Take the pending instruction, if any.
    pub fn take(&self) -> Option<OverrideMode> {
        self.lock().take()
    }

    // The guarded value is a plain Option, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Option<OverrideMode>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drain the slot; with nothing pending the previous mode stays in effect.
pub fn probe_override(last: OverrideMode, slot: &OverrideSlot) -> OverrideMode {
    let mode = match slot.take() {
        Some(mode) => {
            if mode != last {
                info!("Override changed to {}", mode);
            }
            mode
        }
        None => last,
    };

    if mode.is_stay_on() {
        info!("Busy due to manual activation");
    }
    mode
}
