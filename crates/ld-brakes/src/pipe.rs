//! Lead-locomotive brake-pipe dynamics for the straight vacuum brake.

use crate::error::{BrakeError, BrakeResult};
use crate::events::{BrakeControllerState, BrakeEvent};
use ld_core::units::{ONE_ATMOSPHERE_PSI, constants::barometric_pressure_ratio, m3_from_ft3, psi_from_inhg};
use serde::{Deserialize, Serialize};

/// Charging/leak time constants are normalized against this reference
/// brake-system volume so they scale with train length, ft³.
const REFERENCE_BRAKE_SYSTEM_VOLUME_FT3: f64 = 200.0;
/// Floor for the train brake-system volume in the normalization.
const MIN_BRAKE_SYSTEM_VOLUME_M3: f64 = 1e-3;

/// Lead brake-pipe configuration, handed over as already-parsed values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrakePipeParams {
    /// Maximum vacuum the controller can draw at sea level, inHg.
    pub max_vacuum_inhg: f64,
    /// Large-ejector charging rate in Apply, psi/s.
    pub large_ejector_rate_psi_ps: f64,
    /// Single-ejector charging rate outside Apply, psi/s.
    pub charging_rate_psi_ps: f64,
    /// Small-ejector charging rate, psi/s.
    pub small_ejector_rate_psi_ps: f64,
    /// Continuous leak toward atmosphere, psi/s.
    pub leak_rate_psi_ps: f64,
    /// Release time constant, s.
    pub service_time_factor_s: f64,
    /// Eames-type brake with a separate large-ejector handle.
    pub large_ejector_fitted: bool,
}

impl Default for BrakePipeParams {
    fn default() -> Self {
        Self {
            max_vacuum_inhg: 21.0,
            large_ejector_rate_psi_ps: 0.5,
            charging_rate_psi_ps: 0.3,
            small_ejector_rate_psi_ps: 0.3,
            leak_rate_psi_ps: 0.01,
            service_time_factor_s: 10.0,
            large_ejector_fitted: false,
        }
    }
}

/// Per-tick inputs the pipe consults.
#[derive(Clone, Copy, Debug)]
pub struct PipeContext {
    pub controller: BrakeControllerState,
    pub altitude_m: f64,
    /// Total train brake-system volume, m³.
    pub train_brake_system_volume_m3: f64,
    /// Separate large-ejector handle position (Eames type only).
    pub large_ejector_commanded: bool,
}

/// Lead-locomotive brake pipe.
///
/// The pipe is driven toward a controller-state-dependent target by the
/// ejectors, leaks continuously toward atmosphere, and can never pass the
/// altitude-corrected maximum vacuum.
#[derive(Clone, Debug)]
pub struct BrakePipe {
    params: BrakePipeParams,
    pub pressure_psi: f64,
    large_ejector_on: bool,
    small_ejector_on: bool,
}

impl BrakePipe {
    pub fn new(params: BrakePipeParams) -> BrakeResult<Self> {
        if params.max_vacuum_inhg <= 0.0 {
            return Err(BrakeError::InvalidArg {
                what: "max_vacuum_inhg must be positive",
            });
        }
        if params.service_time_factor_s <= 0.0 {
            return Err(BrakeError::InvalidArg {
                what: "service_time_factor_s must be positive",
            });
        }
        Ok(Self {
            params,
            pressure_psi: ONE_ATMOSPHERE_PSI,
            large_ejector_on: false,
            small_ejector_on: false,
        })
    }

    /// Floor of the pipe pressure at the given altitude: atmosphere minus
    /// the barometrically reduced maximum vacuum.
    pub fn min_pressure_psi(&self, altitude_m: f64) -> f64 {
        let reduction = barometric_pressure_ratio(altitude_m);
        ONE_ATMOSPHERE_PSI - psi_from_inhg(self.params.max_vacuum_inhg) * reduction
    }

    pub fn large_ejector_on(&self) -> bool {
        self.large_ejector_on
    }

    pub fn small_ejector_on(&self) -> bool {
        self.small_ejector_on
    }

    fn set_large_ejector(&mut self, on: bool, events: &mut Vec<BrakeEvent>) {
        if self.large_ejector_on != on {
            self.large_ejector_on = on;
            events.push(if on {
                BrakeEvent::LargeEjectorOn
            } else {
                BrakeEvent::LargeEjectorOff
            });
        }
    }

    fn set_small_ejector(&mut self, on: bool, events: &mut Vec<BrakeEvent>) {
        if self.small_ejector_on != on {
            self.small_ejector_on = on;
            events.push(if on {
                BrakeEvent::SmallEjectorOn
            } else {
                BrakeEvent::SmallEjectorOff
            });
        }
    }

    /// Advance the lead pipe one tick. Must run before the per-car cylinder
    /// updates of the same tick: followers read the post-update pressure.
    pub fn update(&mut self, dt_s: f64, ctx: &PipeContext, events: &mut Vec<BrakeEvent>) {
        let min_pressure = self.min_pressure_psi(ctx.altitude_m);

        // Normalize charging and leak rates by the reference volume so time
        // constants scale with train length.
        let volume = ctx
            .train_brake_system_volume_m3
            .max(MIN_BRAKE_SYSTEM_VOLUME_M3);
        let norm = m3_from_ft3(REFERENCE_BRAKE_SYSTEM_VOLUME_FT3) / volume;

        let large_rate = if ctx.controller == BrakeControllerState::Apply {
            self.params.large_ejector_rate_psi_ps
        } else {
            self.params.charging_rate_psi_ps
        };
        let adj_large_rate = norm * large_rate;
        let adj_small_rate = norm * self.params.small_ejector_rate_psi_ps;
        let adj_service_time_s = norm * self.params.service_time_factor_s;
        let adj_leak = self.params.leak_rate_psi_ps / norm;

        match ctx.controller {
            BrakeControllerState::Apply | BrakeControllerState::ApplyAll => {
                // Draw vacuum: decrease pressure toward the corrected floor.
                self.pressure_psi -= dt_s * adj_large_rate;
                if self.pressure_psi < min_pressure {
                    self.pressure_psi = min_pressure;
                }
                self.set_large_ejector(true, events);
                self.set_small_ejector(false, events);
            }
            BrakeControllerState::Emergency => {
                self.pressure_psi -= dt_s * (adj_large_rate + adj_small_rate);
                if self.pressure_psi < min_pressure {
                    self.pressure_psi = min_pressure;
                }
                self.set_large_ejector(true, events);
                self.set_small_ejector(true, events);
            }
            BrakeControllerState::Lap => {
                self.set_large_ejector(false, events);
                self.set_small_ejector(false, events);
            }
            BrakeControllerState::Release | BrakeControllerState::ReleaseOn => {
                // Let air back in: pressure rises toward atmosphere.
                self.pressure_psi += dt_s / adj_service_time_s;
                if self.pressure_psi > ONE_ATMOSPHERE_PSI {
                    self.pressure_psi = ONE_ATMOSPHERE_PSI;
                }
            }
        }

        // Eames-type brake: a separately held large ejector keeps drawing
        // vacuum regardless of the controller position.
        if self.params.large_ejector_fitted && ctx.large_ejector_commanded {
            self.pressure_psi -= dt_s * adj_large_rate;
            if self.pressure_psi < min_pressure {
                self.pressure_psi = min_pressure;
            }
        }

        // Pipe leaks reduce vacuum continuously.
        self.pressure_psi += dt_s * adj_leak;

        self.pressure_psi = self.pressure_psi.clamp(min_pressure, ONE_ATMOSPHERE_PSI);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(controller: BrakeControllerState) -> PipeContext {
        PipeContext {
            controller,
            altitude_m: 0.0,
            train_brake_system_volume_m3: m3_from_ft3(200.0),
            large_ejector_commanded: false,
        }
    }

    #[test]
    fn apply_draws_vacuum_within_bounds() {
        let mut pipe = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let mut events = Vec::new();
        for _ in 0..10_000 {
            pipe.update(0.1, &ctx(BrakeControllerState::Apply), &mut events);
            assert!(pipe.pressure_psi <= ONE_ATMOSPHERE_PSI);
            assert!(pipe.pressure_psi >= pipe.min_pressure_psi(0.0) - 1e-9);
        }
        // settled at the maximum vacuum floor (plus the leak working against it)
        assert!(pipe.pressure_psi < pipe.min_pressure_psi(0.0) + 0.5);
    }

    #[test]
    fn release_returns_to_atmosphere() {
        let mut pipe = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let mut events = Vec::new();
        for _ in 0..2000 {
            pipe.update(0.1, &ctx(BrakeControllerState::Apply), &mut events);
        }
        for _ in 0..10_000 {
            pipe.update(0.1, &ctx(BrakeControllerState::Release), &mut events);
        }
        assert!((pipe.pressure_psi - ONE_ATMOSPHERE_PSI).abs() < 1e-9);
    }

    #[test]
    fn altitude_reduces_attainable_vacuum() {
        let pipe = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let sea = pipe.min_pressure_psi(0.0);
        let high = pipe.min_pressure_psi(2500.0);
        // less vacuum available up high: the floor sits closer to atmosphere
        assert!(high > sea);
    }

    #[test]
    fn ejector_events_fire_once_per_transition() {
        let mut pipe = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let mut events = Vec::new();
        for _ in 0..5 {
            pipe.update(0.1, &ctx(BrakeControllerState::Apply), &mut events);
        }
        let ons = events
            .iter()
            .filter(|e| **e == BrakeEvent::LargeEjectorOn)
            .count();
        assert_eq!(ons, 1);

        events.clear();
        for _ in 0..5 {
            pipe.update(0.1, &ctx(BrakeControllerState::Lap), &mut events);
        }
        let offs = events
            .iter()
            .filter(|e| **e == BrakeEvent::LargeEjectorOff)
            .count();
        assert_eq!(offs, 1);
    }

    #[test]
    fn emergency_uses_both_ejectors() {
        let mut pipe = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let mut slow = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let mut events = Vec::new();
        for _ in 0..100 {
            pipe.update(0.1, &ctx(BrakeControllerState::Emergency), &mut events);
            slow.update(0.1, &ctx(BrakeControllerState::Apply), &mut events);
        }
        assert!(pipe.pressure_psi < slow.pressure_psi);
        assert!(pipe.small_ejector_on());
    }

    #[test]
    fn longer_train_charges_slower() {
        let mut short = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let mut long = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let mut events = Vec::new();
        let mut long_ctx = ctx(BrakeControllerState::Apply);
        long_ctx.train_brake_system_volume_m3 = m3_from_ft3(400.0);
        for _ in 0..50 {
            short.update(0.1, &ctx(BrakeControllerState::Apply), &mut events);
            long.update(0.1, &long_ctx, &mut events);
        }
        assert!(short.pressure_psi < long.pressure_psi);
    }

    #[test]
    fn zero_volume_is_guarded() {
        let mut pipe = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let mut events = Vec::new();
        let mut bad_ctx = ctx(BrakeControllerState::Apply);
        bad_ctx.train_brake_system_volume_m3 = 0.0;
        pipe.update(0.1, &bad_ctx, &mut events);
        assert!(pipe.pressure_psi.is_finite());
    }

    #[test]
    fn leak_raises_pressure_in_lap() {
        let mut pipe = BrakePipe::new(BrakePipeParams::default()).unwrap();
        let mut events = Vec::new();
        for _ in 0..2000 {
            pipe.update(0.1, &ctx(BrakeControllerState::Apply), &mut events);
        }
        let held = pipe.pressure_psi;
        for _ in 0..100 {
            pipe.update(0.1, &ctx(BrakeControllerState::Lap), &mut events);
        }
        assert!(pipe.pressure_psi > held);
    }
}
