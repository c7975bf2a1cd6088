//! Control surfaces: where the user switches between auto and stay-on, or quits.

mod console;
#[cfg(target_os = "macos")]
mod menu_bar;

pub use console::run_console;

use anyhow::Result;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info};

use crate::actuator::LightActuator;
use crate::busy::OverrideMode;
use crate::config::SurfaceKind;
use crate::monitor::AppContext;

/// A user action from any control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Let the probes decide.
    Auto,
    /// Turn the light on now and keep it on.
    StayOn,
    /// Turn the light off and exit.
    Quit,
}

/// Handles control actions on the calling (non-runtime) thread.
pub struct ControlSurface<A> {
    context: Arc<AppContext<A>>,
    runtime: Handle,
}

impl<A: LightActuator> ControlSurface<A> {
    pub fn new(context: Arc<AppContext<A>>, runtime: Handle) -> Self {
        Self { context, runtime }
    }

    /// Apply `action`.
    ///
    /// "Stay On" switches the light synchronously instead of waiting for the
    /// next poll. "Quit" stops the loop, which turns the light off on its way
    /// out so the final call cannot race an in-flight cycle.
    pub fn handle(&self, action: ControlAction) {
        match action {
            ControlAction::Auto => {
                info!("Set auto mode through UI");
                self.context.overrides().set(OverrideMode::Auto);
            }
            ControlAction::StayOn => {
                info!("Forced busy status through UI");
                self.context.overrides().set(OverrideMode::StayOn);
                if let Err(e) = self.runtime.block_on(self.context.set_light_state(true)) {
                    error!("Failed to turn light on: {}", e);
                }
            }
            ControlAction::Quit => {
                info!("Quitting from UI");
                self.context.request_shutdown();
            }
        }
    }
}

/// Run the configured surface on the current thread until the user quits.
///
/// The headless surface returns immediately.
pub fn run_surface<A>(surface: ControlSurface<A>, kind: SurfaceKind) -> Result<()>
where
    A: LightActuator + 'static,
{
    match kind {
        #[cfg(target_os = "macos")]
        SurfaceKind::Menu => menu_bar::run_menu_bar(Arc::new(surface)),
        #[cfg(not(target_os = "macos"))]
        SurfaceKind::Menu => {
            tracing::warn!("Menu bar is only available on macOS, using the console");
            run_console_on_stdio(&surface)
        }
        SurfaceKind::Console => run_console_on_stdio(&surface),
        SurfaceKind::Headless => {
            info!("No control surface; press Ctrl-C to quit");
            Ok(())
        }
    }
}

fn run_console_on_stdio<A: LightActuator>(surface: &ControlSurface<A>) -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_console(surface, stdin.lock(), stdout.lock())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{RecordingActuator, ScriptedSignals};
    use crate::monitor::{LightState, Monitor, MonitorSettings};
    use std::time::Duration;

    fn surface() -> (
        tokio::runtime::Runtime,
        Arc<AppContext<RecordingActuator>>,
        ControlSurface<RecordingActuator>,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let context = Arc::new(AppContext::new(
            RecordingActuator::default(),
            Duration::from_secs(30),
        ));
        let surface = ControlSurface::new(context.clone(), runtime.handle().clone());
        (runtime, context, surface)
    }

    #[test]
    fn test_stay_on_switches_light_immediately() {
        let (_runtime, context, surface) = surface();

        surface.handle(ControlAction::StayOn);

        assert_eq!(context.actuator().calls(), vec![true]);
        assert_eq!(context.overrides().take(), Some(OverrideMode::StayOn));
    }

    #[test]
    fn test_stay_on_failure_still_sets_override() {
        let (_runtime, context, surface) = surface();
        context.actuator().set_failing(true);

        surface.handle(ControlAction::StayOn);

        assert_eq!(context.actuator().calls(), vec![true]);
        assert_eq!(context.overrides().take(), Some(OverrideMode::StayOn));
    }

    #[test]
    fn test_auto_clears_override_without_switching() {
        let (_runtime, context, surface) = surface();

        surface.handle(ControlAction::StayOn);
        surface.handle(ControlAction::Auto);

        assert_eq!(context.actuator().calls(), vec![true]);
        assert_eq!(context.overrides().take(), Some(OverrideMode::Auto));
    }

    #[test]
    fn test_quit_stops_loop() {
        let (_runtime, context, surface) = surface();

        surface.handle(ControlAction::Quit);

        assert!(!context.is_running());
        assert!(context.actuator().calls().is_empty());
    }

    fn idle_monitor(
        context: &Arc<AppContext<RecordingActuator>>,
    ) -> Monitor<RecordingActuator, ScriptedSignals> {
        Monitor::new(
            context.clone(),
            ScriptedSignals::with_counts(&[5]),
            MonitorSettings {
                poll_interval: Duration::from_secs(10),
                min_new_keypress_count: 40,
                process_name: String::new(),
            },
        )
    }

    #[test]
    fn test_loop_picks_up_stay_on() {
        let (_runtime, context, surface) = surface();
        let mut monitor = idle_monitor(&context);

        surface.handle(ControlAction::StayOn);
        let report = tokio_test::block_on(monitor.run_cycle());

        assert!(report.verdict.manual);
        assert_eq!(report.light, LightState::On);
        // Already on from the direct switch
        assert!(!report.transitioned);
        assert_eq!(context.actuator().calls(), vec![true]);
    }

    #[test]
    fn test_auto_right_after_stay_on_turns_light_off() {
        let (_runtime, context, surface) = surface();
        let mut monitor = idle_monitor(&context);
        tokio_test::block_on(monitor.start());

        // Both land before the next cycle; the slot only keeps Auto
        surface.handle(ControlAction::StayOn);
        surface.handle(ControlAction::Auto);

        let report = tokio_test::block_on(monitor.run_cycle());
        assert!(!report.verdict.is_busy());
        assert!(report.transitioned);
        assert_eq!(report.light, LightState::Off);
        assert_eq!(context.actuator().calls(), vec![false, true, false]);

        for _ in 0..4 {
            let report = tokio_test::block_on(monitor.run_cycle());
            assert!(!report.transitioned);
        }
        assert_eq!(context.actuator().calls(), vec![false, true, false]);
    }
}
