use tracing::info;

use super::ReadFailures;
use crate::signals::KeypressCounter;

/// Result of one keypress probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypressSample {
    pub busy: bool,
    /// Baseline for the next probe. `None` after a failed read.
    pub count: Option<u64>,
}

/// Compare the counter against the previous sample.
///
/// The first sample has no baseline and is never busy. A counter that went
/// backwards counts as zero new keypresses.
pub fn probe_keypress(
    counter: &impl KeypressCounter,
    last_count: Option<u64>,
    threshold: u64,
    failures: &mut ReadFailures,
) -> KeypressSample {
    let current = match counter.keypress_count() {
        Ok(count) => {
            failures.succeeded();
            count
        }
        Err(e) => {
            failures.failed(&e);
            return KeypressSample {
                busy: false,
                count: None,
            };
        }
    };

    let busy = match last_count {
        Some(last) => {
            let new_keypresses = current.saturating_sub(last);
            let busy = new_keypresses >= threshold;
            if busy {
                info!("Busy due to keypresses ({} new keypresses)", new_keypresses);
            }
            busy
        }
        None => false,
    };

    KeypressSample {
        busy,
        count: Some(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalError;

    struct Fixed(Option<u64>);

    fn failures() -> ReadFailures {
        ReadFailures::new("keypress counter")
    }

    impl KeypressCounter for Fixed {
        fn keypress_count(&self) -> Result<u64, SignalError> {
            self.0
                .ok_or_else(|| SignalError::Unavailable("no counter".to_string()))
        }
    }

    #[test]
    fn test_first_sample_is_never_busy() {
        for value in [0, 80, 10_000, u64::MAX] {
            let sample = probe_keypress(&Fixed(Some(value)), None, 80, &mut failures());
            assert!(!sample.busy);
            assert_eq!(sample.count, Some(value));
        }
    }

    #[test]
    fn test_busy_iff_delta_reaches_threshold() {
        let cases = [(100, 100, false), (100, 179, false), (100, 180, true), (100, 205, true)];
        for (last, current, expected) in cases {
            let sample = probe_keypress(&Fixed(Some(current)), Some(last), 80, &mut failures());
            assert_eq!(sample.busy, expected, "{} -> {}", last, current);
            assert_eq!(sample.count, Some(current));
        }
    }

    #[test]
    fn test_counter_reset_is_not_busy() {
        let sample = probe_keypress(&Fixed(Some(3)), Some(5_000), 80, &mut failures());
        assert!(!sample.busy);
        assert_eq!(sample.count, Some(3));
    }

    #[test]
    fn test_read_failure_drops_baseline() {
        let sample = probe_keypress(&Fixed(None), Some(100), 80, &mut failures());
        assert_eq!(
            sample,
            KeypressSample {
                busy: false,
                count: None
            }
        );
    }

    #[test]
    fn test_missing_counter_is_flagged_until_it_returns() {
        let mut failures = failures();
        for _ in 0..3 {
            let sample = probe_keypress(&Fixed(None), None, 80, &mut failures);
            assert!(!sample.busy);
            assert!(failures.is_failing());
        }

        let sample = probe_keypress(&Fixed(Some(42)), None, 80, &mut failures);
        assert_eq!(sample.count, Some(42));
        assert!(!failures.is_failing());
    }
}
