//! Reconciliation loop: poll the probes, switch the light on transitions only.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use crate::actuator::{ActuatorError, LightActuator};
use crate::busy::{
    probe_keypress, probe_override, probe_process_running, BusyVerdict, OverrideMode, OverrideSlot,
    ReadFailures,
};
use crate::config::MonitorConfig;
use crate::signals::{KeypressCounter, ProcessLister};

/// State shared between the polling thread and the control surface.
pub struct AppContext<A> {
    actuator: A,
    /// Last state the actuator accepted. Held for the whole switch call, so
    /// calls from the loop and the control surface never interleave.
    light: Mutex<LightState>,
    overrides: OverrideSlot,
    running: AtomicBool,
    shutdown: Notify,
    actuator_timeout: Duration,
}

impl<A: LightActuator> AppContext<A> {
    pub fn new(actuator: A, actuator_timeout: Duration) -> Self {
        Self {
            actuator,
            light: Mutex::new(LightState::Off),
            overrides: OverrideSlot::new(),
            running: AtomicBool::new(true),
            shutdown: Notify::new(),
            actuator_timeout,
        }
    }

    /// Pending manual override instruction.
    pub fn overrides(&self) -> &OverrideSlot {
        &self.overrides
    }

    #[cfg(test)]
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the loop after its current cycle and wake it if it is sleeping.
    pub fn request_shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Shutdown requested");
        }
        self.shutdown.notify_waiters();
    }

    /// Last light state the actuator accepted.
    pub async fn light(&self) -> LightState {
        *self.light.lock().await
    }

    /// Switch the light unconditionally, bounded by the actuator timeout.
    pub async fn set_light_state(&self, on: bool) -> Result<(), ActuatorError> {
        let mut light = self.light.lock().await;
        self.command(&mut light, LightState::from_busy(on)).await
    }

    /// Switch the light only if `desired` differs from the last accepted state.
    ///
    /// Returns the previous state when a switch happened.
    pub async fn reconcile(
        &self,
        desired: LightState,
    ) -> Result<Option<LightState>, ActuatorError> {
        let mut light = self.light.lock().await;
        if *light == desired {
            return Ok(None);
        }
        let previous = *light;
        self.command(&mut light, desired).await?;
        Ok(Some(previous))
    }

    // A failed call leaves `light` untouched so the next reconcile retries
    async fn command(
        &self,
        light: &mut LightState,
        desired: LightState,
    ) -> Result<(), ActuatorError> {
        let call = self.actuator.set_light_state(desired.is_on());
        match tokio::time::timeout(self.actuator_timeout, call).await {
            Ok(Ok(())) => {
                *light = desired;
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ActuatorError::Timeout(self.actuator_timeout)),
        }
    }

    /// Sleep for `interval` unless shutdown is requested first.
    ///
    /// Returns whether the loop should keep going.
    async fn wait_for_next_cycle(&self, interval: Duration) -> bool {
        let notified = self.shutdown.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent request cannot be missed
        notified.as_mut().enable();

        if !self.is_running() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut notified => {}
        }

        self.is_running()
    }
}

/// Last state commanded to the light.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LightState {
    #[default]
    Off,
    On,
}

impl LightState {
    pub fn from_busy(busy: bool) -> Self {
        if busy {
            LightState::On
        } else {
            LightState::Off
        }
    }

    pub fn is_on(self) -> bool {
        self == LightState::On
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightState::Off => f.write_str("off"),
            LightState::On => f.write_str("on"),
        }
    }
}

/// Loop tuning taken from [`MonitorConfig`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub min_new_keypress_count: u64,
    pub process_name: String,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            min_new_keypress_count: config.min_new_keypress_count,
            process_name: config.process_name.clone(),
        }
    }
}

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub verdict: BusyVerdict,
    /// Light state after the cycle.
    pub light: LightState,
    /// Whether the actuator was switched this cycle.
    pub transitioned: bool,
}

/// The busy-light state machine.
///
/// Owns the previous keypress sample and the effective override; the light
/// state lives in [`AppContext`] so direct switches from the control surface
/// are seen by the next cycle.
pub struct Monitor<A, S> {
    context: Arc<AppContext<A>>,
    signals: S,
    settings: MonitorSettings,
    last_keypress_count: Option<u64>,
    override_mode: OverrideMode,
    keypress_failures: ReadFailures,
    process_failures: ReadFailures,
}

impl<A, S> Monitor<A, S>
where
    A: LightActuator,
    S: KeypressCounter + ProcessLister,
{
    pub fn new(context: Arc<AppContext<A>>, signals: S, settings: MonitorSettings) -> Self {
        Self {
            context,
            signals,
            settings,
            last_keypress_count: None,
            override_mode: OverrideMode::Auto,
            keypress_failures: ReadFailures::new("keypress counter"),
            process_failures: ReadFailures::new("process list"),
        }
    }

    /// Force the light off regardless of what it was before we started.
    pub async fn start(&mut self) {
        info!("Making sure the light is off initially");
        if let Err(e) = self.context.set_light_state(false).await {
            warn!("Failed to turn light off at startup: {}", e);
        }
    }

    /// Probe once and switch the light if the verdict differs from its state.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let sample = probe_keypress(
            &self.signals,
            self.last_keypress_count,
            self.settings.min_new_keypress_count,
            &mut self.keypress_failures,
        );
        self.last_keypress_count = sample.count;

        let process = probe_process_running(
            &self.signals,
            &self.settings.process_name,
            &mut self.process_failures,
        );
        self.override_mode = probe_override(self.override_mode, self.context.overrides());

        let verdict = BusyVerdict {
            keypresses: sample.busy,
            process,
            manual: self.override_mode.is_stay_on(),
        };
        debug!("Cycle verdict: {}", verdict);

        let desired = LightState::from_busy(verdict.is_busy());
        let transitioned = match self.context.reconcile(desired).await {
            Ok(Some(previous)) => {
                info!("Light {} -> {}", previous, desired);
                true
            }
            Ok(None) => false,
            // State stays put so the next cycle retries
            Err(e) => {
                error!("Failed to turn light {}: {}", desired, e);
                false
            }
        };

        CycleReport {
            verdict,
            light: self.context.light().await,
            transitioned,
        }
    }

    /// Run until shutdown is requested, then turn the light off.
    ///
    /// Returns the number of completed cycles.
    pub async fn run(mut self) -> u64 {
        info!(
            "Monitoring: poll interval={:?}, keypress threshold={}, process={:?}",
            self.settings.poll_interval, self.settings.min_new_keypress_count, self.settings.process_name
        );

        self.start().await;

        let mut cycles: u64 = 0;
        loop {
            self.run_cycle().await;
            cycles += 1;

            if !self.context.wait_for_next_cycle(self.settings.poll_interval).await {
                break;
            }
        }

        info!("Turning light off before exit");
        if let Err(e) = self.context.set_light_state(false).await {
            error!("Failed to turn light off on exit: {}", e);
        }

        info!("Monitor stopped after {} cycles", cycles);
        cycles
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingActuator, ScriptedSignals};
    use super::*;

    fn settings(threshold: u64) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(10),
            min_new_keypress_count: threshold,
            process_name: "zoom.us".to_string(),
        }
    }

    fn monitor(
        counts: &[u64],
        threshold: u64,
    ) -> (Arc<AppContext<RecordingActuator>>, Monitor<RecordingActuator, ScriptedSignals>) {
        let context = Arc::new(AppContext::new(
            RecordingActuator::default(),
            Duration::from_secs(30),
        ));
        let monitor = Monitor::new(
            context.clone(),
            ScriptedSignals::with_counts(counts),
            settings(threshold),
        );
        (context, monitor)
    }

    #[tokio::test]
    async fn test_start_turns_light_off_exactly_once() {
        let (context, mut monitor) = monitor(&[0], 80);
        monitor.start().await;

        assert_eq!(context.actuator().calls(), vec![false]);
        assert_eq!(context.light().await, LightState::Off);
    }

    #[tokio::test]
    async fn test_keypress_burst_turns_light_on_once() {
        let (context, mut monitor) = monitor(&[100, 100, 205], 80);
        monitor.start().await;

        let first = monitor.run_cycle().await;
        assert!(!first.verdict.is_busy());
        let second = monitor.run_cycle().await;
        assert!(!second.verdict.is_busy());
        let third = monitor.run_cycle().await;
        assert!(third.verdict.keypresses);
        assert!(third.transitioned);
        assert_eq!(third.light, LightState::On);

        assert_eq!(context.actuator().calls(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_unchanged_verdict_does_not_reswitch() {
        let (context, mut monitor) = monitor(&[0, 100, 200, 300, 400, 500, 500], 80);
        monitor.start().await;

        for _ in 0..6 {
            monitor.run_cycle().await;
        }
        assert_eq!(context.actuator().calls(), vec![false, true]);

        // Counter stops moving: one transition back, then nothing
        for _ in 0..4 {
            monitor.run_cycle().await;
        }
        assert_eq!(context.actuator().calls(), vec![false, true, false]);
        assert_eq!(context.light().await, LightState::Off);
    }

    #[tokio::test]
    async fn test_running_process_keeps_light_on() {
        let (context, mut monitor) = monitor(&[7], 80);
        monitor.start().await;
        monitor.signals.set_processes(&["launchd", "zoom.us"]);

        for _ in 0..3 {
            let report = monitor.run_cycle().await;
            assert!(report.verdict.process);
            assert_eq!(report.light, LightState::On);
        }

        monitor.signals.set_processes(&["launchd"]);
        let report = monitor.run_cycle().await;
        assert_eq!(report.light, LightState::Off);
        assert_eq!(context.actuator().calls(), vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_stay_on_override_is_sticky() {
        let (context, mut monitor) = monitor(&[7], 80);
        monitor.start().await;
        context.overrides().set(OverrideMode::StayOn);

        for _ in 0..5 {
            let report = monitor.run_cycle().await;
            assert!(report.verdict.manual);
            assert!(!report.verdict.keypresses);
            assert!(!report.verdict.process);
            assert!(report.verdict.is_busy());
        }
        assert_eq!(context.actuator().calls(), vec![false, true]);

        context.overrides().set(OverrideMode::Auto);
        let report = monitor.run_cycle().await;
        assert!(!report.verdict.is_busy());
        assert_eq!(context.actuator().calls(), vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_direct_switch_then_auto_ends_off() {
        let (context, mut monitor) = monitor(&[7], 80);
        monitor.start().await;

        // What the control surface does for Stay On, followed by Auto
        context.overrides().set(OverrideMode::StayOn);
        context.set_light_state(true).await.unwrap();
        context.overrides().set(OverrideMode::Auto);
        assert_eq!(context.light().await, LightState::On);

        for _ in 0..5 {
            let report = monitor.run_cycle().await;
            assert!(!report.verdict.is_busy());
            assert_eq!(report.light, LightState::Off);
        }
        assert_eq!(context.actuator().calls(), vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_reconcile_skips_matching_state() {
        let (context, _monitor) = monitor(&[7], 80);

        assert_eq!(context.reconcile(LightState::Off).await.unwrap(), None);
        assert_eq!(
            context.reconcile(LightState::On).await.unwrap(),
            Some(LightState::Off)
        );
        assert_eq!(context.reconcile(LightState::On).await.unwrap(), None);
        assert_eq!(context.actuator().calls(), vec![true]);
    }

    #[tokio::test]
    async fn test_failed_transition_is_retried() {
        let (context, mut monitor) = monitor(&[7], 80);
        monitor.start().await;
        context.overrides().set(OverrideMode::StayOn);
        context.actuator().set_failing(true);

        let report = monitor.run_cycle().await;
        assert!(report.verdict.is_busy());
        assert!(!report.transitioned);
        assert_eq!(report.light, LightState::Off);

        context.actuator().set_failing(false);
        let report = monitor.run_cycle().await;
        assert!(report.transitioned);
        assert_eq!(report.light, LightState::On);

        assert_eq!(context.actuator().calls(), vec![false, true, true]);
    }

    #[tokio::test]
    async fn test_unreadable_counter_is_not_busy() {
        let (context, mut monitor) = monitor(&[], 80);
        monitor.start().await;

        for _ in 0..3 {
            let report = monitor.run_cycle().await;
            assert!(!report.verdict.is_busy());
        }
        assert!(monitor.keypress_failures.is_failing());
        assert!(!monitor.process_failures.is_failing());
        assert_eq!(context.actuator().calls(), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown_and_turns_light_off() {
        let (context, monitor) = monitor(&[7], 80);
        context.overrides().set(OverrideMode::StayOn);

        let handle = tokio::spawn(monitor.run());

        // Cycles at t=0s, 10s and 20s; shutdown lands mid-sleep
        tokio::time::sleep(Duration::from_secs(25)).await;
        context.request_shutdown();

        let cycles = handle.await.unwrap();
        assert_eq!(cycles, 3);
        assert_eq!(context.actuator().calls(), vec![false, true, false]);
        assert!(!context.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_sleep() {
        let (context, monitor) = monitor(&[7], 80);
        context.request_shutdown();

        let cycles = monitor.run().await;
        assert_eq!(cycles, 1);
        assert_eq!(context.actuator().calls(), vec![false, false]);
    }

    struct HangingActuator;

    impl LightActuator for HangingActuator {
        async fn set_light_state(&self, _on: bool) -> Result<(), ActuatorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_actuator_call_is_bounded() {
        let context = AppContext::new(HangingActuator, Duration::from_secs(5));

        let err = context.set_light_state(true).await.unwrap_err();
        assert!(matches!(err, ActuatorError::Timeout(d) if d == Duration::from_secs(5)));
    }
}
