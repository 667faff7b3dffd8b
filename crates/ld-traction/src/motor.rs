//! DC traction motor: discretized RL circuit behind a generator.
//!
//! Electrical model per motor group:
//!
//! ```text
//! L · dI/dt = U − R_total · I          (explicit Euler, previous-tick RHS)
//! U = V_generator − backEMF
//! flux = ampToFlow · I · fieldFactor
//! F_induced = flux · I,  F_wheel = F_induced · gearing
//! backEMF = flux · ω · bemfFactor, clamped to [0, V]
//! ```
//!
//! Every step reads the *previous* tick's voltage, inductor voltage, current
//! and back-EMF on the right-hand side. The ordering is load-bearing for
//! stability and must not be switched to post-update values.

use crate::error::{TractionError, TractionResult};
use ld_table::{Surface, Table};
use serde::{Deserialize, Serialize};

/// Generator voltage slew toward the demanded value, V/s.
const VOLTAGE_RAMP_VPS: f64 = 40.0;
/// Voltage slew while the heating override drives the generator, V/s.
const HEATING_RAMP_VPS: f64 = 120.0;
/// Voltage slew for heating at closed throttle, V/s.
const HEATING_IDLE_RAMP_VPS: f64 = 400.0;
/// Band inside which the voltage snaps to the demanded value, avoiding
/// oscillation around it.
const VOLTAGE_SNAP_BAND_V: f64 = 2.0;
/// Floor for the total circuit resistance in divisions.
const MIN_TOTAL_RESISTANCE_OHM: f64 = 1e-6;
/// Below this previous-tick current the generator is unloaded and the
/// power-based voltage caps are skipped.
const MIN_LOAD_CURRENT_A: f64 = 1e-3;
/// Fraction of usable power past which further notching up is refused in
/// field-change-by-notch operation.
const THROTTLE_FORBID_POWER_FRACTION: f64 = 0.95;

/// Motor and generator configuration, handed over as already-parsed values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotorParams {
    /// Armature resistance, Ω.
    pub internal_r_ohm: f64,
    /// Field resistance, Ω; rescaled by the notch field factor.
    pub field_r_ohm: f64,
    /// Motor inductance, H; sets the current time response.
    pub inductance_h: f64,
    /// Back-EMF from flux and rotation speed.
    pub bemf_factor: f64,
    /// Flux per ampere of field current.
    pub amp_to_flow_factor: f64,
    pub motor_count: u32,
    /// Full generator voltage, V.
    pub generator_voltage: f64,
    /// Generator voltage at the bottom of the throttle range, V.
    pub generator_low_voltage: f64,
    /// Train-heating generator target, V.
    pub heating_voltage: f64,
    pub max_current_a: f64,
    /// Cap on the summed motive force, N.
    pub max_force_n: f64,
    /// Gearing reduction between motors and wheels.
    pub gearing_reduction: f64,
    pub wheel_radius_m: f64,
    pub max_speed_mps: f64,
    /// Throttle-controller notch count.
    pub notch_count: u32,
    /// Number of notches reserved for field changes at the top of the range.
    pub field_change_number: u32,
    /// Field weakening scheduled by notch instead of by speed.
    pub field_change_by_notch: bool,
    /// Configuration switch: the DC-motor force replaces the legacy
    /// table-driven force.
    pub use_dc_motor_force: bool,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            internal_r_ohm: 0.25,
            field_r_ohm: 0.25,
            inductance_h: 1.5,
            bemf_factor: 0.005,
            amp_to_flow_factor: 0.0,
            motor_count: 1,
            generator_voltage: 1500.0,
            generator_low_voltage: 0.0,
            heating_voltage: 0.0,
            max_current_a: 1000.0,
            max_force_n: 300_000.0,
            gearing_reduction: 1.0,
            wheel_radius_m: 0.5,
            max_speed_mps: 30.0,
            notch_count: 8,
            field_change_number: 0,
            field_change_by_notch: false,
            use_dc_motor_force: true,
        }
    }
}

/// Field-weakening and motor-coupling schedules.
#[derive(Clone, Debug, Default)]
pub struct MotorTables {
    /// Field factor by (throttle fraction, speed) while accelerating.
    pub field_speed_up: Option<Surface>,
    /// Field factor by (throttle fraction, speed) while decelerating.
    pub field_speed_down: Option<Surface>,
    /// Field factor by throttle fraction in notch operation.
    pub field_notch: Option<Table>,
    /// Serial motor count by throttle fraction (coupling changes).
    pub coupling_notch: Option<Table>,
}

/// Per-tick inputs, an explicit context object; the motor never reaches
/// into sibling locomotive or train state.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotorContext {
    pub dt_s: f64,
    /// Operator throttle, percent [0, 100].
    pub throttle_percent: f64,
    pub abs_speed_mps: f64,
    pub abs_wheel_speed_mps: f64,
    /// Sign of the train acceleration: selects the field-change branch.
    pub accelerating: bool,
    /// Train-heating command active on this (lead) locomotive.
    pub heating_active: bool,
    /// Usable prime-mover power after heating absorption, W.
    pub usable_power_w: f64,
    /// Declared maximum prime-mover output, W.
    pub max_output_power_w: f64,
}

/// DC traction motor state for one powered axle group.
///
/// Mutated every tick; the electrical transients are deliberately not
/// persisted; they re-converge from inputs within a few time constants.
#[derive(Clone, Debug)]
pub struct TractionMotor {
    params: MotorParams,
    tables: MotorTables,
    /// Generator voltage, V.
    pub voltage: f64,
    /// Voltage target the generator ramps toward, V.
    pub demanded_voltage: f64,
    /// Back-EMF, V.
    pub back_emf: f64,
    /// Voltage across the inductor after deducting back-EMF, V.
    pub inductor_voltage: f64,
    /// Motor current, A (also the cab display value).
    pub current_a: f64,
    /// Flux from current through the field, Wb.
    pub flux: f64,
    /// Force generated by flux, N.
    pub induced_force_n: f64,
    /// Force at the wheel after the gearing reduction, N.
    pub wheel_force_n: f64,
    /// Motor rotation speed, RPM.
    pub rot_speed_rpm: f64,
    /// Summed motive force over all motors, capped, N.
    pub motive_force_n: f64,
    /// Demanded power exceeds usable power; generator voltage is flattened.
    pub overload: bool,
    /// Power excess while overloaded, W.
    pub overload_value_w: f64,
    /// Current exceeded U = R·I and was limited.
    pub overamp: bool,
    /// Notching up refused near the power ceiling (notch operation only).
    pub throttle_increase_forbidden: bool,
    /// Heating override demands the throttle return to zero.
    pub throttle_to_zero: bool,
    prev_notch: f64,
}

impl TractionMotor {
    pub fn new(params: MotorParams, tables: MotorTables) -> TractionResult<Self> {
        if params.inductance_h <= 0.0 {
            return Err(TractionError::InvalidArg {
                what: "inductance must be positive",
            });
        }
        if params.motor_count == 0 {
            return Err(TractionError::InvalidArg {
                what: "motor_count must be at least 1",
            });
        }
        if params.wheel_radius_m <= 0.0 {
            return Err(TractionError::InvalidArg {
                what: "wheel_radius_m must be positive",
            });
        }
        if params.max_speed_mps <= 0.0 {
            return Err(TractionError::InvalidArg {
                what: "max_speed_mps must be positive",
            });
        }
        if params.field_change_by_notch && tables.field_notch.is_none() {
            tracing::warn!("field change by notch configured without a notch table");
        }
        Ok(Self {
            params,
            tables,
            voltage: 0.0,
            demanded_voltage: 0.0,
            back_emf: 0.0,
            inductor_voltage: 0.0,
            current_a: 0.0,
            flux: 0.0,
            induced_force_n: 0.0,
            wheel_force_n: 0.0,
            rot_speed_rpm: 0.0,
            motive_force_n: 0.0,
            overload: false,
            overload_value_w: 0.0,
            overamp: false,
            throttle_increase_forbidden: false,
            throttle_to_zero: false,
            prev_notch: 0.0,
        })
    }

    pub fn params(&self) -> &MotorParams {
        &self.params
    }

    /// Current shown on the cab ammeter (per motor).
    pub fn displayed_amperage(&self) -> f64 {
        self.current_a
    }

    /// Advance the motor one tick.
    pub fn update(&mut self, ctx: &MotorContext) {
        let p = &self.params;
        let dt = ctx.dt_s;
        if dt <= 0.0 {
            return;
        }

        let full_voltage = p.generator_voltage;
        let mut shunted_r = p.field_r_ohm;
        let inductance = p.inductance_h;
        let motor_count = f64::from(p.motor_count);
        // abs speed → motor RPM through the gearing
        let k_rot = p.gearing_reduction * 60.0 / (std::f64::consts::PI * p.wheel_radius_m * 2.0);

        // previous-tick values for the derivative terms
        let prev_voltage = self.voltage;
        let prev_back_emf = self.back_emf;
        let prev_inductor_voltage = self.inductor_voltage;
        let prev_current = self.current_a;

        let mut field_factor = 1.0;
        let throttle_fraction = ctx.throttle_percent / 100.0;

        let serial_motor_count = self
            .tables
            .coupling_notch
            .as_ref()
            .map(|t| t.get(throttle_fraction))
            .filter(|&v| v > 0.0)
            .unwrap_or(1.0);

        let mut generator_used_low_voltage = p.generator_low_voltage;
        self.throttle_to_zero = false;

        // Demanded voltage: virtual-notch, heating override, or plain
        // throttle-proportional.
        if p.field_change_by_notch {
            let effective_notches =
                (f64::from(p.notch_count) - f64::from(p.field_change_number)).max(1.0);
            let virtual_fraction = f64::from(p.notch_count) / effective_notches;
            let wanted_notch = (virtual_fraction * throttle_fraction).min(1.0);
            self.demanded_voltage =
                p.generator_low_voltage + (full_voltage - p.generator_low_voltage) * wanted_notch;

            if ctx.heating_active {
                // Leaving notch zero while heating restarts the generator from
                // zero; dropping under the heating target demands throttle off.
                if wanted_notch != 0.0 && self.prev_notch == 0.0 {
                    self.voltage = 0.0;
                }
                if self.demanded_voltage < p.heating_voltage && self.prev_notch > 0.0 {
                    self.throttle_to_zero = true;
                }
            }
            self.prev_notch = wanted_notch;
        } else if ctx.heating_active {
            generator_used_low_voltage = p.heating_voltage;
            self.demanded_voltage =
                p.heating_voltage + (full_voltage - p.heating_voltage) * throttle_fraction;
            if self.voltage < self.demanded_voltage {
                self.voltage += HEATING_RAMP_VPS * dt;
            }
        } else {
            self.demanded_voltage = p.generator_low_voltage
                + (full_voltage - p.generator_low_voltage) * throttle_fraction;
        }

        if ctx.throttle_percent > 0.0 {
            // Voltage the generator can deliver at this speed.
            let speed_envelope = (generator_used_low_voltage
                + (ctx.abs_speed_mps / (p.max_speed_mps / 5.0))
                    * (generator_used_low_voltage + p.generator_voltage))
                * throttle_fraction;

            if self.demanded_voltage < speed_envelope || p.field_change_by_notch {
                if self.voltage < self.demanded_voltage {
                    // Overload pre-check BEFORE the ramp step: if the stepped
                    // voltage would exceed usable power, flatten instead.
                    if prev_current * (self.voltage + VOLTAGE_RAMP_VPS * dt)
                        > ctx.usable_power_w / motor_count
                        && prev_current > MIN_LOAD_CURRENT_A
                    {
                        self.voltage = (ctx.usable_power_w / prev_current) / motor_count;
                        self.overload = true;
                    } else {
                        self.voltage += VOLTAGE_RAMP_VPS * dt;
                    }
                } else if self.voltage > self.demanded_voltage {
                    self.voltage -= VOLTAGE_RAMP_VPS * dt;
                } else if prev_current * self.voltage > ctx.max_output_power_w / motor_count
                    && prev_current > MIN_LOAD_CURRENT_A
                {
                    self.voltage = (ctx.usable_power_w / motor_count) / prev_current;
                }
            } else {
                // Generator pinned to its speed-proportional characteristic.
                self.voltage = speed_envelope;
                if prev_current * self.voltage > ctx.usable_power_w / motor_count
                    && prev_current > MIN_LOAD_CURRENT_A
                {
                    self.voltage = (ctx.usable_power_w / motor_count) / prev_current;
                }
            }

            // Near the demanded voltage, set it exactly to avoid oscillation.
            if (self.demanded_voltage - self.voltage).abs() < VOLTAGE_SNAP_BAND_V {
                self.voltage = self.demanded_voltage;
            }

            // Field change factor: scheduled by speed (branch on the train
            // acceleration sign) or by notch (also rescales the field R).
            shunted_r = p.field_r_ohm;
            if !p.field_change_by_notch {
                let surface = if ctx.accelerating {
                    self.tables.field_speed_up.as_mut()
                } else {
                    self.tables.field_speed_down.as_mut()
                };
                if let Some(s) = surface {
                    field_factor = s.get(throttle_fraction, ctx.abs_speed_mps);
                }
                if field_factor <= 0.0 {
                    field_factor = 1.0;
                }
            } else if let Some(t) = &self.tables.field_notch {
                field_factor = t.get(throttle_fraction);
                if field_factor <= 0.0 {
                    field_factor = 1.0;
                }
                shunted_r = p.field_r_ohm * field_factor;
            }

            self.inductor_voltage = (self.voltage - prev_back_emf).min(self.voltage);
        } else {
            // Throttle closed: line contactors open, no traction voltage
            // unless the heating override keeps the generator alive.
            if ctx.heating_active {
                self.demanded_voltage = p.generator_voltage;
                if self.voltage < self.demanded_voltage {
                    self.voltage += HEATING_IDLE_RAMP_VPS * dt;
                }
            } else {
                self.demanded_voltage = 0.0;
                self.voltage = 0.0;
            }
        }

        let total_r = (p.internal_r_ohm + shunted_r).max(MIN_TOTAL_RESISTANCE_OHM);
        let current_limit = p.max_current_a * serial_motor_count / motor_count;
        let heating_idle = ctx.heating_active && ctx.throttle_percent == 0.0;

        // Discretized RL circuit, previous-tick right-hand side.
        if ctx.abs_speed_mps > 0.0 {
            if heating_idle {
                self.inductor_voltage = 0.0;
                self.current_a = 0.0;
            } else {
                self.inductor_voltage = (prev_voltage - prev_back_emf).min(self.voltage);
                self.current_a = (prev_inductor_voltage - total_r * prev_current)
                    * (dt / inductance)
                    + prev_current;
                if self.current_a > current_limit {
                    self.current_a = current_limit;
                }
            }
        } else {
            self.inductor_voltage = if heating_idle { 0.0 } else { self.voltage };
            self.current_a =
                (prev_inductor_voltage - total_r * prev_current) * (dt / inductance) + prev_current;
            if self.current_a > current_limit {
                self.current_a = current_limit;
            }
        }

        // Overload: demanded electrical power exceeds usable prime-mover
        // power per motor; the flag flattens the generator next tick.
        self.overload = false;
        self.overload_value_w = 0.0;
        let electrical_power = self.current_a * (self.inductor_voltage + prev_back_emf);
        if electrical_power > ctx.usable_power_w / motor_count {
            self.overload_value_w = electrical_power - ctx.usable_power_w / motor_count;
            self.overload = true;
        }
        self.throttle_increase_forbidden = p.field_change_by_notch
            && electrical_power > (ctx.usable_power_w / motor_count) * THROTTLE_FORBID_POWER_FRACTION;

        // Overamp: more current than U = R·I allows, limited to that value.
        self.overamp = false;
        if self.current_a > self.voltage / total_r {
            self.current_a = self.voltage / total_r;
            self.overamp = true;
        }

        // Braking regime not modeled here: negative current clamps to zero.
        if self.current_a < 0.0 {
            self.current_a = 0.0;
        }

        // Flux, force and back-EMF chain.
        if p.field_r_ohm > 0.0 {
            self.flux = p.amp_to_flow_factor * self.current_a * field_factor;
        }
        self.induced_force_n = self.flux * self.current_a;
        self.wheel_force_n = self.induced_force_n * p.gearing_reduction;
        self.rot_speed_rpm = k_rot * ctx.abs_wheel_speed_mps;
        self.back_emf = (self.flux * self.rot_speed_rpm * p.bemf_factor).clamp(0.0, self.voltage);

        if self.wheel_force_n < 0.0 {
            self.wheel_force_n = 0.0;
        }
        if self.rot_speed_rpm < 0.0 {
            self.rot_speed_rpm = 0.0;
        }

        self.motive_force_n = (self.wheel_force_n * motor_count).min(p.max_force_n);
    }
}
