//! Busy detection: one probe per evidence source, OR-ed into a verdict.

mod failures;
mod keypress;
mod manual;
mod process;

pub use failures::ReadFailures;
pub use keypress::probe_keypress;
pub use manual::{probe_override, OverrideMode, OverrideSlot};
pub use process::probe_process_running;

use std::fmt;

/// Combine the three probe outputs. Any single true input makes the user busy.
pub fn aggregate(keypress_busy: bool, process_busy: bool, override_busy: bool) -> bool {
    keypress_busy || process_busy || override_busy
}

/// Sub-verdicts of one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusyVerdict {
    /// Enough new keypresses since the previous cycle.
    pub keypresses: bool,
    /// The watched process is running.
    pub process: bool,
    /// The user asked the light to stay on.
    pub manual: bool,
}

impl BusyVerdict {
    pub fn is_busy(&self) -> bool {
        aggregate(self.keypresses, self.process, self.manual)
    }
}

impl fmt::Display for BusyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_busy() {
            return f.write_str("not busy");
        }
        let reasons: Vec<&str> = [
            (self.keypresses, "keypresses"),
            (self.process, "process"),
            (self.manual, "manual"),
        ]
        .into_iter()
        .filter_map(|(hit, name)| hit.then_some(name))
        .collect();
        write!(f, "busy ({})", reasons.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_is_logical_or() {
        for k in [false, true] {
            for p in [false, true] {
                for m in [false, true] {
                    assert_eq!(aggregate(k, p, m), k || p || m);
                }
            }
        }
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(BusyVerdict::default().to_string(), "not busy");

        let verdict = BusyVerdict {
            keypresses: true,
            process: false,
            manual: true,
        };
        assert!(verdict.is_busy());
        assert_eq!(verdict.to_string(), "busy (keypresses, manual)");
    }
}
