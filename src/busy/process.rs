use tracing::info;

use super::ReadFailures;
use crate::signals::ProcessLister;

/// True iff a running process is named exactly `process_name`.
///
/// An empty name disables the check. Enumeration failure counts as not busy.
pub fn probe_process_running(
    lister: &impl ProcessLister,
    process_name: &str,
    failures: &mut ReadFailures,
) -> bool {
    if process_name.is_empty() {
        return false;
    }

    match lister.process_names() {
        Ok(names) => {
            failures.succeeded();
            let running = names.iter().any(|name| name == process_name);
            if running {
                info!("Busy due to running {} application", process_name);
            }
            running
        }
        Err(e) => {
            failures.failed(&e);
            false
        }
    }
}
