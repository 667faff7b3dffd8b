//! Per-tick exchange with the vehicle-dynamics integrator.

use ld_brakes::{BrakeControllerState, BrakeEvent};
use ld_transmission::GearEvent;
use serde::{Deserialize, Serialize};

/// Direction of travel set by the reverser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// Everything a tick consumes, supplied by external collaborators. An
/// explicit context object: no component reaches into sibling car or train
/// state.
#[derive(Clone, Copy, Debug)]
pub struct TickInputs {
    /// Elapsed simulation time, s; must be positive.
    pub elapsed_s: f64,
    /// Operator throttle, percent [0, 100]; clamped on entry.
    pub throttle_percent: f64,
    /// Absolute car speed, m/s, ≥ 0.
    pub speed_mps: f64,
    /// Absolute wheel speed, m/s, ≥ 0 (differs from car speed when slipping).
    pub wheel_speed_mps: f64,
    pub direction: Direction,
    pub altitude_m: f64,
    /// Signed train acceleration; only the sign is consulted.
    pub train_acceleration_mps2: f64,
    pub brake_controller: BrakeControllerState,
    pub train_brake_system_volume_m3: f64,
    /// Train-heating command active on the lead locomotive.
    pub heating_active: bool,
    /// Separate large-ejector handle (Eames-type brakes).
    pub large_ejector_commanded: bool,
    pub wheel_skid: bool,
    /// Brake-shoe friction coefficient adjustment for the applied force.
    pub brake_shoe_coeff_adj: f64,
    /// Brake-shoe friction coefficient adjustment for the retard force.
    pub brake_shoe_retard_coeff_adj: f64,
    /// Post-update lead pipe pressure, for follower cars; `None` on the lead
    /// locomotive, which owns the pipe.
    pub lead_pipe_pressure_psi: Option<f64>,
}

impl Default for TickInputs {
    fn default() -> Self {
        Self {
            elapsed_s: 0.1,
            throttle_percent: 0.0,
            speed_mps: 0.0,
            wheel_speed_mps: 0.0,
            direction: Direction::Forward,
            altitude_m: 0.0,
            train_acceleration_mps2: 0.0,
            brake_controller: BrakeControllerState::Lap,
            train_brake_system_volume_m3: 5.66,
            heating_active: false,
            large_ejector_commanded: false,
            wheel_skid: false,
            brake_shoe_coeff_adj: 1.0,
            brake_shoe_retard_coeff_adj: 1.0,
            lead_pipe_pressure_psi: None,
        }
    }
}

/// Side effect surfaced to the audio layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    Gear(GearEvent),
    Brake(BrakeEvent),
}

/// Everything a tick produces for the vehicle-dynamics integrator and the
/// instrumentation (HUD, sound triggers).
#[derive(Clone, Debug, Default)]
pub struct TickOutputs {
    pub tractive_force_n: f64,
    pub brake_force_n: f64,
    pub brake_retard_force_n: f64,
    /// Cab ammeter value, A per motor.
    pub displayed_amperage: f64,
    /// Generator voltage, V.
    pub displayed_voltage: f64,
    pub engine_rpm: f64,
    pub gear_index: Option<usize>,
    pub overload: bool,
    pub overamp: bool,
    pub overspeed_warning: bool,
    pub events: Vec<SimEvent>,
}
