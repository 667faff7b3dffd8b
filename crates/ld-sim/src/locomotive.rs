//! Locomotive orchestration: engine → gearbox commit → force → motor.

use crate::context::{Direction, SimEvent, TickInputs, TickOutputs};
use crate::error::{SimError, SimResult};
use ld_brakes::{BrakePipe, CarBrakeSnapshot, CarVacuumBrake, PipeContext};
use ld_traction::{MotorContext, TractionMotor};
use ld_transmission::{DieselEngine, GearBox, GearBoxContext, GearBoxSnapshot};
use serde::{Deserialize, Serialize};

/// Clutch fraction slew per second while engaging or releasing.
const CLUTCH_SLEW_PER_S: f64 = 1.0;

/// Persisted locomotive state, aggregating the component snapshots in save
/// order. Motor transients are recomputed from inputs, not persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocomotiveSnapshot {
    pub gearbox: Option<GearBoxSnapshot>,
    pub brake: CarBrakeSnapshot,
}

/// One locomotive: diesel engine, optional mechanical gearbox, optional DC
/// traction motor, vacuum brake, and the lead brake pipe when this car
/// leads the train.
pub struct Locomotive {
    pub engine: DieselEngine,
    pub gearbox: Option<GearBox>,
    pub motor: Option<TractionMotor>,
    pub brake: CarVacuumBrake,
    pub pipe: Option<BrakePipe>,
    clutch_fraction: f64,
}

impl Locomotive {
    pub fn new(
        engine: DieselEngine,
        gearbox: Option<GearBox>,
        motor: Option<TractionMotor>,
        brake: CarVacuumBrake,
        pipe: Option<BrakePipe>,
    ) -> Self {
        Self {
            engine,
            gearbox,
            motor,
            brake,
            pipe,
            clutch_fraction: 0.0,
        }
    }

    /// Seed all components for a moving start.
    pub fn initialize_moving(&mut self, speed_mps: f64, equalizing_reservoir_inhg: f64) {
        if let Some(gb) = &mut self.gearbox {
            gb.initialize_moving(speed_mps);
            self.clutch_fraction = gb.clutch_percent() / 100.0;
            let shaft = speed_mps
                / gb.current_gear()
                    .map(|g| g.ratio)
                    .filter(|&r| r > 0.0)
                    .unwrap_or(1.0);
            self.engine.set_rpm(shaft);
        }
        self.brake.initialize_moving(equalizing_reservoir_inhg);
    }

    fn gearbox_context(&self, inputs: &TickInputs) -> GearBoxContext {
        let signed_speed = match inputs.direction {
            Direction::Forward => inputs.speed_mps,
            Direction::Reverse => -inputs.speed_mps,
        };
        GearBoxContext {
            throttle_percent: inputs.throttle_percent,
            demanded_throttle_percent: inputs.throttle_percent,
            speed_mps: signed_speed,
            engine_rpm: self.engine.rpm(),
            engine_max_rpm: self.engine.max_rpm,
            engine_starting_rpm: self.engine.starting_rpm,
            engine_running: self.engine.is_running(),
            engine_power_w: self.engine.output_power_w(),
            torque_at_rpm: self.engine.torque_at(self.engine.rpm()),
            torque_max: self.engine.torque_max(),
        }
    }

    /// Advance one simulation tick.
    ///
    /// Ordering contract: the gearbox commit runs before tractive-force
    /// computation, so a gear change is visible to force output in the same
    /// tick; the motor reads the committed drivetrain state; the lead brake
    /// pipe updates before the cylinder that consumes it.
    pub fn tick(&mut self, inputs: &TickInputs) -> SimResult<TickOutputs> {
        if inputs.elapsed_s <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "elapsed_s must be positive",
            });
        }
        if !inputs.speed_mps.is_finite() || inputs.speed_mps < 0.0 {
            return Err(SimError::NonPhysical {
                what: "speed_mps must be finite and non-negative",
            });
        }
        let dt = inputs.elapsed_s;
        if !(0.0..=100.0).contains(&inputs.throttle_percent) {
            tracing::warn!(
                throttle = inputs.throttle_percent,
                "throttle percent out of range, clamping"
            );
        }
        let throttle = inputs.throttle_percent.clamp(0.0, 100.0);
        let inputs = TickInputs {
            throttle_percent: throttle,
            ..*inputs
        };

        let mut outputs = TickOutputs::default();

        // Prime mover first: the box and motor read this tick's RPM/power.
        let coupled_shaft = self.gearbox.as_ref().and_then(|gb| {
            let ctx = self.gearbox_context(&inputs);
            (self.clutch_fraction >= 1.0 && gb.current_gear().is_some())
                .then(|| gb.shaft_rpm(&ctx))
        });
        self.engine.update(dt, throttle, coupled_shaft);

        let mut tractive_force_n = 0.0;
        let ctx = self.gearbox_context(&inputs);
        if let Some(gb) = &mut self.gearbox {
            // Clutch dynamics: slew toward engagement, then let the state
            // machine commit against the fresh fraction.
            let engaged = gb.is_clutch_on(&ctx);
            let target = if engaged { 1.0 } else { 0.0 };
            let step = (target - self.clutch_fraction).clamp(-CLUTCH_SLEW_PER_S * dt, CLUTCH_SLEW_PER_S * dt);
            self.clutch_fraction += step;
            gb.set_clutch_percent(self.clutch_fraction * 100.0);

            if let Some(event) = gb.update(dt, &ctx) {
                outputs.events.push(SimEvent::Gear(event));
            }
            // Same-tick visibility: force reads the committed gear.
            tractive_force_n = gb.tractive_force_n(&ctx);
            outputs.gear_index = gb.current_gear_index();
            outputs.overspeed_warning = gb.is_overspeed_warning(&ctx);
        }

        if let Some(motor) = &mut self.motor {
            let ctx = MotorContext {
                dt_s: dt,
                throttle_percent: throttle,
                abs_speed_mps: inputs.speed_mps,
                abs_wheel_speed_mps: inputs.wheel_speed_mps,
                accelerating: inputs.train_acceleration_mps2 > 0.0,
                heating_active: inputs.heating_active,
                usable_power_w: self.engine.output_power_w(),
                max_output_power_w: self.engine.output_power_w().max(1.0),
            };
            motor.update(&ctx);
            outputs.displayed_amperage = motor.displayed_amperage();
            outputs.displayed_voltage = motor.voltage;
            outputs.overload = motor.overload;
            outputs.overamp = motor.overamp;
            // Configuration switch, not a runtime decision: the DC-motor
            // force replaces the drivetrain force when selected.
            if motor.params().use_dc_motor_force {
                tractive_force_n = motor.motive_force_n;
            }
        }

        // Brake: lead pipe before the cylinder that consumes it.
        let mut brake_events = Vec::new();
        let pipe_pressure = match inputs.lead_pipe_pressure_psi {
            Some(p) => p,
            None => {
                if let Some(pipe) = &mut self.pipe {
                    let ctx = PipeContext {
                        controller: inputs.brake_controller,
                        altitude_m: inputs.altitude_m,
                        train_brake_system_volume_m3: inputs.train_brake_system_volume_m3,
                        large_ejector_commanded: inputs.large_ejector_commanded,
                    };
                    pipe.update(dt, &ctx, &mut brake_events);
                    pipe.pressure_psi
                } else {
                    self.brake.pipe_pressure_psi
                }
            }
        };
        self.brake.update(
            dt,
            pipe_pressure,
            inputs.brake_controller,
            inputs.wheel_skid,
            inputs.brake_shoe_coeff_adj,
            inputs.brake_shoe_retard_coeff_adj,
            &mut brake_events,
        );
        outputs
            .events
            .extend(brake_events.into_iter().map(SimEvent::Brake));

        outputs.tractive_force_n = tractive_force_n;
        outputs.brake_force_n = self.brake.brake_force_n;
        outputs.brake_retard_force_n = self.brake.brake_retard_force_n;
        outputs.engine_rpm = self.engine.rpm();
        Ok(outputs)
    }

    /// Capture persisted state; restore mirrors this order.
    pub fn snapshot(&self) -> LocomotiveSnapshot {
        LocomotiveSnapshot {
            gearbox: self.gearbox.as_ref().map(GearBox::snapshot),
            brake: self.brake.snapshot(),
        }
    }

    pub fn restore(&mut self, snapshot: &LocomotiveSnapshot) {
        if let (Some(gb), Some(snap)) = (self.gearbox.as_mut(), snapshot.gearbox.as_ref()) {
            gb.restore(snap);
            self.clutch_fraction = gb.clutch_percent() / 100.0;
        }
        self.brake.restore(&snapshot.brake);
    }
}
