//! Signals for Linux read from procfs.
//!
//! The keypress counter is the interrupt count of the i8042 keyboard line
//! (IRQ 1) summed over all CPUs. Process names come from `/proc/<pid>/comm`,
//! which the kernel truncates to 15 bytes.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::trace;

use super::{KeypressCounter, ProcessLister, SignalError};

/// Keyboard IRQ on PC-compatible controllers.
const KEYBOARD_IRQ: &str = "1";

/// procfs-backed signal source.
#[derive(Debug, Clone)]
pub struct SystemSignals {
    proc_root: PathBuf,
}

impl SystemSignals {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Use an alternate procfs mount.
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl Default for SystemSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl KeypressCounter for SystemSignals {
    fn keypress_count(&self) -> Result<u64, SignalError> {
        let text = fs::read_to_string(self.proc_root.join("interrupts"))?;
        parse_keyboard_interrupts(&text).ok_or_else(|| {
            SignalError::Unavailable("no i8042 keyboard line in /proc/interrupts".to_string())
        })
    }
}

impl ProcessLister for SystemSignals {
    fn process_names(&self) -> Result<Vec<String>, SignalError> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.proc_root)? {
            let Ok(entry) = entry else { continue };
            let file_name = entry.file_name();
            let Some(pid) = file_name.to_str() else { continue };
            if !pid.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }

            match fs::read_to_string(entry.path().join("comm")) {
                Ok(comm) => names.push(comm.trim_end_matches('\n').to_string()),
                // Exited between read_dir and read
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    trace!("Process {} exited during scan", pid);
                }
                Err(e) => trace!("Skipping pid {}: {}", pid, e),
            }
        }

        Ok(names)
    }
}

/// Sum the per-CPU counts of the i8042 keyboard line.
fn parse_keyboard_interrupts(text: &str) -> Option<u64> {
    let mut lines = text.lines();
    let cpus = lines.next()?.split_whitespace().count();

    lines.find_map(|line| {
        let (irq, rest) = line.trim_start().split_once(':')?;
        if irq != KEYBOARD_IRQ || !rest.contains("i8042") {
            return None;
        }
        let total = rest
            .split_whitespace()
            .take(cpus)
            .map_while(|field| field.parse::<u64>().ok())
            .sum();
        Some(total)
    })
}
