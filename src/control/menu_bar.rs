//! macOS status bar menu.

use anyhow::Result;
use std::sync::Arc;
use system_status_bar_macos::{Menu, MenuItem, StatusItem};
use tracing::info;

use super::{ControlAction, ControlSurface};
use crate::actuator::LightActuator;

fn item<A>(title: &str, surface: &Arc<ControlSurface<A>>, action: ControlAction) -> MenuItem
where
    A: LightActuator + 'static,
{
    let surface = surface.clone();
    MenuItem::new(title, Some(Box::new(move || surface.handle(action))), None)
}

/// Show the status item and run the macOS event loop on this thread.
///
/// Never returns: the monitor thread exits the process after "Quit".
pub fn run_menu_bar<A>(surface: Arc<ControlSurface<A>>) -> Result<()>
where
    A: LightActuator + 'static,
{
    let menu = Menu::new(vec![
        item("Auto", &surface, ControlAction::Auto),
        item("Stay On", &surface, ControlAction::StayOn),
        item("Quit", &surface, ControlAction::Quit),
    ]);
    let _status_item = StatusItem::new("Busy Sign", menu);

    info!("Menu bar initialized");

    // Menu items handle their own events; the loop only needs a receiver
    let (_event_sender, event_receiver) = std::sync::mpsc::channel::<()>();
    system_status_bar_macos::sync_infinite_event_loop(event_receiver, |_| {});

    Ok(())
}
