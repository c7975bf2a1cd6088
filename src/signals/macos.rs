//! Signals for macOS using CoreGraphics event counters and libproc.

use std::os::raw::{c_int, c_void};
use tracing::trace;

use super::{KeypressCounter, ProcessLister, SignalError};

/// `kCGEventSourceStateCombinedSessionState`
const COMBINED_SESSION_STATE: i32 = 0;
/// `kCGEventKeyDown`
const KEY_DOWN: u32 = 10;
/// `2 * MAXCOMLEN`, the longest name `proc_name` returns.
const PROC_NAME_LEN: usize = 32;

extern "C" {
    // CoreGraphics, linked by build.rs
    fn CGEventSourceCounterForEventType(state_id: i32, event_type: u32) -> u32;

    // libproc (libSystem)
    fn proc_listallpids(buffer: *mut c_void, buffersize: c_int) -> c_int;
    fn proc_name(pid: c_int, buffer: *mut c_void, buffersize: u32) -> c_int;
}

/// Signal source backed by the window server and the kernel process table.
#[derive(Debug, Default, Clone)]
pub struct SystemSignals;

impl SystemSignals {
    pub fn new() -> Self {
        Self
    }
}

impl KeypressCounter for SystemSignals {
    fn keypress_count(&self) -> Result<u64, SignalError> {
        // Safe to call from any thread; returns 0 when no session is attached
        let count = unsafe { CGEventSourceCounterForEventType(COMBINED_SESSION_STATE, KEY_DOWN) };
        Ok(u64::from(count))
    }
}

impl ProcessLister for SystemSignals {
    fn process_names(&self) -> Result<Vec<String>, SignalError> {
        let pids = list_pids()?;
        let mut names = Vec::with_capacity(pids.len());

        for pid in pids.into_iter().filter(|&pid| pid > 0) {
            let mut buf = [0u8; PROC_NAME_LEN + 1];
            let len = unsafe { proc_name(pid, buf.as_mut_ptr().cast(), buf.len() as u32) };
            if len <= 0 {
                // Exited since listing, or not ours to inspect
                trace!("Skipping pid {}", pid);
                continue;
            }
            names.push(String::from_utf8_lossy(&buf[..len as usize]).into_owned());
        }

        Ok(names)
    }
}

fn list_pids() -> Result<Vec<c_int>, SignalError> {
    let estimate = unsafe { proc_listallpids(std::ptr::null_mut(), 0) };
    if estimate <= 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    // Leave headroom for processes spawned between the two calls
    let capacity = estimate as usize + 64;
    let mut pids: Vec<c_int> = vec![0; capacity];
    let bytes = (capacity * std::mem::size_of::<c_int>()) as c_int;
    let count = unsafe { proc_listallpids(pids.as_mut_ptr().cast(), bytes) };
    if count < 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    pids.truncate(count as usize);
    Ok(pids)
}
