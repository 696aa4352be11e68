use crate::config::SignalTiming;
use crate::shared_data::{LaneId, VehicleCount};
use log::{debug, info};
use tokio::time::{Duration, Instant};

/// The possible states for a lane's traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPhase {
    Green,
    Yellow,
    Red,
}

impl SignalPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SignalPhase::Green => "Green",
            SignalPhase::Yellow => "Yellow",
            SignalPhase::Red => "Red",
        }
    }
}

/// Snapshot of the controller, cheap to copy out for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    /// The only lane that is not RED.
    pub active_lane: LaneId,
    /// Phase of `active_lane`, either GREEN or YELLOW.
    pub phase: SignalPhase,
    pub phase_started_at: Instant,
    /// True while the YELLOW phase waits for its timer.
    pub transition_in_progress: bool,
}

/// Why a GREEN phase is being ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// GREEN reached `max_green`.
    MaxGreenElapsed,
    /// `challenger` outnumbers the active lane by more than the congestion ratio.
    Congestion { challenger: LaneId },
}

/// Result of feeding the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseChange {
    /// The active lane turned YELLOW; the transition completes at `until`.
    YellowStarted {
        lane: LaneId,
        cause: TransitionCause,
        until: Instant,
    },
    /// The outgoing lane turned RED and `to` turned GREEN.
    GreenStarted { from: LaneId, to: LaneId },
    /// Forced change with no other lane available: the GREEN timer restarts.
    GreenRestarted { lane: LaneId },
}

/// Adaptive signal state machine for a single intersection.
///
/// Exactly one lane is GREEN or YELLOW at a time. A lane leaving GREEN always
/// spends `timing.yellow` in YELLOW before another lane turns GREEN. The
/// machine is clock-agnostic: callers pass `now`.
#[derive(Debug, Clone)]
pub struct TrafficLightController {
    lanes: usize,
    timing: SignalTiming,
    state: ControllerState,
    yellow_until: Option<Instant>,
}

impl TrafficLightController {
    /// Starts with lane 0 GREEN.
    pub fn new(lanes: usize, timing: SignalTiming, now: Instant) -> Self {
        assert!(lanes > 0, "a signal controller needs at least one lane");
        Self {
            lanes,
            timing,
            state: ControllerState {
                active_lane: 0,
                phase: SignalPhase::Green,
                phase_started_at: now,
                transition_in_progress: false,
            },
            yellow_until: None,
        }
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn timing(&self) -> &SignalTiming {
        &self.timing
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// When the pending YELLOW phase ends, if a transition is in progress.
    pub fn yellow_deadline(&self) -> Option<Instant> {
        self.yellow_until
    }

    pub fn phase_of(&self, lane: LaneId) -> SignalPhase {
        if lane == self.state.active_lane {
            self.state.phase
        } else {
            SignalPhase::Red
        }
    }

    pub fn phases(&self) -> Vec<SignalPhase> {
        (0..self.lanes).map(|lane| self.phase_of(lane)).collect()
    }

    /// Evaluates the transition rules against the latest counts.
    ///
    /// Panics if `counts` does not hold exactly one entry per lane.
    pub fn update(&mut self, counts: &[VehicleCount], now: Instant) -> Option<PhaseChange> {
        self.check_counts(counts);

        if self.state.transition_in_progress {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.state.phase_started_at);
        if elapsed < self.timing.min_green {
            return None;
        }

        if elapsed >= self.timing.max_green {
            if self.lanes == 1 {
                // Nowhere to hand over to: restart the same lane's GREEN.
                self.state.phase_started_at = now;
                debug!("Lane 0 GREEN re-armed after {:?}", elapsed);
                return Some(PhaseChange::GreenRestarted { lane: 0 });
            }
            return Some(self.begin_transition(TransitionCause::MaxGreenElapsed, now));
        }

        let active = self.state.active_lane;
        let threshold = counts[active] as f64 * self.timing.congestion_ratio;
        let challenger = highest_count_lane(counts, Some(active))
            .filter(|&lane| counts[lane] as f64 > threshold)?;

        Some(self.begin_transition(TransitionCause::Congestion { challenger }, now))
    }

    /// Ends the YELLOW phase: the outgoing lane turns RED and the busiest
    /// other lane turns GREEN. Returns `None` if no transition was pending.
    pub fn complete_transition(
        &mut self,
        counts: &[VehicleCount],
        now: Instant,
    ) -> Option<PhaseChange> {
        self.check_counts(counts);

        if !self.state.transition_in_progress {
            return None;
        }

        let from = self.state.active_lane;
        let to = highest_count_lane(counts, Some(from)).unwrap_or(from);
        self.state = ControllerState {
            active_lane: to,
            phase: SignalPhase::Green,
            phase_started_at: now,
            transition_in_progress: false,
        };
        self.yellow_until = None;
        info!(
            "Lane {} RED, lane {} GREEN (counts {:?})",
            from + 1,
            to + 1,
            counts
        );
        Some(PhaseChange::GreenStarted { from, to })
    }

    fn begin_transition(&mut self, cause: TransitionCause, now: Instant) -> PhaseChange {
        let lane = self.state.active_lane;
        let until = now + self.timing.yellow;
        self.state.phase = SignalPhase::Yellow;
        self.state.phase_started_at = now;
        self.state.transition_in_progress = true;
        self.yellow_until = Some(until);
        info!("Lane {} YELLOW ({:?})", lane + 1, cause);
        PhaseChange::YellowStarted { lane, cause, until }
    }

    fn check_counts(&self, counts: &[VehicleCount]) {
        assert_eq!(
            counts.len(),
            self.lanes,
            "lane count table does not match the controller's lanes"
        );
    }

    /// Time the current phase has lasted.
    pub fn phase_elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.phase_started_at)
    }
}

/// Busiest lane, ties going to the lowest lane id.
pub fn highest_count_lane(counts: &[VehicleCount], exclude: Option<LaneId>) -> Option<LaneId> {
    let mut best: Option<LaneId> = None;
    for (lane, &count) in counts.iter().enumerate() {
        if Some(lane) == exclude {
            continue;
        }
        match best {
            Some(b) if counts[b] >= count => {}
            _ => best = Some(lane),
        }
    }
    best
}
