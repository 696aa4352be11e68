use crate::control_system::traffic_light_controller::{
    ControllerState, PhaseChange, SignalPhase, TrafficLightController,
};
use crate::shared_data::{LaneCounts, LaneId};
use log::{debug, info};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Read-only, thread-safe view of the signal state, handed to lane workers
/// and the renderer.
#[derive(Debug, Clone)]
pub struct SignalView {
    controller: Arc<RwLock<TrafficLightController>>,
}

impl SignalView {
    fn read(&self) -> RwLockReadGuard<'_, TrafficLightController> {
        self.controller.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrafficLightController> {
        self.controller.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ControllerState {
        self.read().state()
    }

    pub fn phase_of(&self, lane: LaneId) -> SignalPhase {
        self.read().phase_of(lane)
    }

    pub fn phases(&self) -> Vec<SignalPhase> {
        self.read().phases()
    }
}

/// Owner of the signal state machine.
///
/// Only the control loop (through [`SignalControl::tick`]) and the YELLOW
/// timer task mutate the controller. The timer is cancelled by
/// [`SignalControl::shutdown`], which settles any pending transition.
pub struct SignalControl {
    view: SignalView,
    counts: Arc<LaneCounts>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SignalControl {
    pub fn new(controller: TrafficLightController, counts: Arc<LaneCounts>) -> Self {
        assert_eq!(
            controller.lanes(),
            counts.lanes(),
            "controller and count table disagree on lane count"
        );
        Self {
            view: SignalView {
                controller: Arc::new(RwLock::new(controller)),
            },
            counts,
            timer: Mutex::new(None),
        }
    }

    pub fn view(&self) -> SignalView {
        self.view.clone()
    }

    pub fn state(&self) -> ControllerState {
        self.view.state()
    }

    /// Feeds the latest counts to the controller. Must run inside a Tokio
    /// runtime: starting a YELLOW phase spawns its completion timer.
    pub fn tick(&self) -> Option<PhaseChange> {
        let counts = self.counts.snapshot();
        let change = self.view.write().update(&counts, Instant::now());
        if let Some(PhaseChange::YellowStarted { until, .. }) = change {
            self.arm_timer(until);
        }
        change
    }

    fn arm_timer(&self, until: Instant) {
        let view = self.view.clone();
        let counts = Arc::clone(&self.counts);
        let handle = tokio::spawn(async move {
            sleep_until(until).await;
            let snapshot = counts.snapshot();
            view.write().complete_transition(&snapshot, until);
        });

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
    }

    /// Cancels the YELLOW timer and completes any pending transition now, so
    /// the machine never stays in YELLOW after teardown.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            debug!("YELLOW timer cancelled");
        }

        let counts = self.counts.snapshot();
        let mut controller = self.view.write();
        if controller.state().transition_in_progress {
            controller.complete_transition(&counts, Instant::now());
            info!("Pending signal transition completed during shutdown");
        }
    }
}

impl Drop for SignalControl {
    fn drop(&mut self) {
        if let Some(handle) = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
