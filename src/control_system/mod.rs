pub mod signal_control;
pub mod traffic_light_controller;

pub use signal_control::{SignalControl, SignalView};
pub use traffic_light_controller::{
    ControllerState, PhaseChange, SignalPhase, TrafficLightController, TransitionCause,
};
