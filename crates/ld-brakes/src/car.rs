//! Per-car straight-vacuum brake: cylinder tracking and brake force.

use crate::error::{BrakeError, BrakeResult};
use crate::events::{
    BrakeControllerState, BrakeEvent, PressureTrend, SOUND_TRIGGER_PERIOD, TrendEvent,
};
use ld_core::units::{ONE_ATMOSPHERE_PSI, vacuum_inhg_to_psia};
use serde::{Deserialize, Serialize};

/// Cylinder/pipe agreement band for re-arming the sound trigger, psi.
const TRIGGER_REARM_BAND_PSI: f64 = 0.05;

/// Car brake configuration, handed over as already-parsed values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CarBrakeParams {
    pub max_release_rate_psi_ps: f64,
    pub max_application_rate_psi_ps: f64,
    pub num_brake_cylinders: u32,
    pub brake_cylinder_volume_m3: f64,
    pub brake_pipe_volume_m3: f64,
    pub max_brake_force_n: f64,
    pub max_handbrake_force_n: f64,
    /// Pressure differential delivering the full brake force, psi.
    pub max_force_pressure_psi: f64,
    /// Friction factor replacing the shoe coefficient under wheel skid.
    pub skid_friction: f64,
    pub handbrake_present: bool,
    /// Engines and tenders skip cylinder tracking in Apply/Lap (twin-ejector
    /// behavior) and own the sound-enable latch.
    pub is_engine_or_tender: bool,
}

impl Default for CarBrakeParams {
    fn default() -> Self {
        Self {
            max_release_rate_psi_ps: 2.0,
            max_application_rate_psi_ps: 2.0,
            num_brake_cylinders: 1,
            brake_cylinder_volume_m3: 0.05,
            brake_pipe_volume_m3: 0.3,
            max_brake_force_n: 30_000.0,
            max_handbrake_force_n: 20_000.0,
            max_force_pressure_psi: 10.3,
            skid_friction: 0.08,
            handbrake_present: true,
            is_engine_or_tender: false,
        }
    }
}

/// Persisted car-brake state; the remaining fields are recomputed from the
/// tick inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CarBrakeSnapshot {
    pub cyl_pressure_psia: f64,
    pub pipe_pressure_psi: f64,
}

/// Straight-vacuum brake state for one car.
///
/// The brake cylinder tracks the brake-pipe pressure directly; restoring
/// atmospheric pressure in the pipe applies the brakes.
#[derive(Clone, Debug)]
pub struct CarVacuumBrake {
    params: CarBrakeParams,
    pub cyl_pressure_psia: f64,
    pub pipe_pressure_psi: f64,
    pub handbrake_percent: f64,
    pub brake_force_n: f64,
    pub brake_retard_force_n: f64,
    prev_cyl_pressure_psia: f64,
    prev_pipe_pressure_psi: f64,
    cyl_trend: PressureTrend,
    pipe_trend: PressureTrend,
    sound_trigger_counter: u32,
    sound_trigger_enabled: bool,
    brake_trigger_match: bool,
}

impl CarVacuumBrake {
    pub fn new(params: CarBrakeParams) -> BrakeResult<Self> {
        if params.brake_pipe_volume_m3 <= 0.0 {
            return Err(BrakeError::InvalidArg {
                what: "brake_pipe_volume_m3 must be positive",
            });
        }
        if params.max_force_pressure_psi <= 0.0 {
            return Err(BrakeError::InvalidArg {
                what: "max_force_pressure_psi must be positive",
            });
        }
        if params.num_brake_cylinders == 0 {
            tracing::warn!("no brake cylinders configured, cylinder will track the pipe directly");
        }
        Ok(Self {
            params,
            cyl_pressure_psia: ONE_ATMOSPHERE_PSI,
            pipe_pressure_psi: ONE_ATMOSPHERE_PSI,
            handbrake_percent: 0.0,
            brake_force_n: 0.0,
            brake_retard_force_n: 0.0,
            prev_cyl_pressure_psia: ONE_ATMOSPHERE_PSI,
            prev_pipe_pressure_psi: ONE_ATMOSPHERE_PSI,
            cyl_trend: PressureTrend::default(),
            pipe_trend: PressureTrend::default(),
            sound_trigger_counter: 0,
            sound_trigger_enabled: true,
            brake_trigger_match: false,
        })
    }

    /// Seed at car spawn from the full-service vacuum.
    pub fn initialize(&mut self, handbrake_on: bool, full_service_vacuum_inhg: f64) {
        let p = vacuum_inhg_to_psia(full_service_vacuum_inhg);
        self.cyl_pressure_psia = p;
        self.pipe_pressure_psi = p;
        self.prev_cyl_pressure_psia = p;
        self.prev_pipe_pressure_psi = p;
        self.handbrake_percent = if handbrake_on && self.params.handbrake_present {
            100.0
        } else {
            0.0
        };
    }

    /// Seed for a moving start from the train's equalizing reservoir.
    pub fn initialize_moving(&mut self, equalizing_reservoir_inhg: f64) {
        let p = vacuum_inhg_to_psia(equalizing_reservoir_inhg);
        self.cyl_pressure_psia = p;
        self.pipe_pressure_psi = p;
        self.prev_cyl_pressure_psia = p;
        self.prev_pipe_pressure_psi = p;
        self.handbrake_percent = 0.0;
    }

    pub fn set_handbrake_percent(&mut self, percent: f64) {
        self.handbrake_percent = if self.params.handbrake_present {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
    }

    /// Advance one tick against the lead's post-update pipe pressure.
    ///
    /// The cylinder moves toward the pipe at the release/application rate;
    /// the two pressure deltas are solved jointly with the volume ratio
    /// `vr = nCyl·cylVol / pipeVol` as `dp = Δp / (1 + vr)`, so the step
    /// never overshoots equilibrium.
    pub fn update(
        &mut self,
        dt_s: f64,
        pipe_pressure_psi: f64,
        controller: BrakeControllerState,
        skid: bool,
        shoe_coeff_adj: f64,
        shoe_retard_coeff_adj: f64,
        events: &mut Vec<BrakeEvent>,
    ) {
        self.pipe_pressure_psi = pipe_pressure_psi;

        // Engines and tenders hold their cylinder in Apply/Lap.
        let skip_cylinder = self.params.is_engine_or_tender
            && matches!(
                controller,
                BrakeControllerState::Apply | BrakeControllerState::Lap
            );

        if !skip_cylinder {
            let vr = f64::from(self.params.num_brake_cylinders)
                * self.params.brake_cylinder_volume_m3
                / self.params.brake_pipe_volume_m3;
            if self.pipe_pressure_psi < self.cyl_pressure_psia {
                // pipe vacuum rising: brakes releasing
                let mut dp = dt_s * self.params.max_release_rate_psi_ps;
                if self.cyl_pressure_psia - dp < self.pipe_pressure_psi + dp * vr {
                    dp = (self.cyl_pressure_psia - self.pipe_pressure_psi) / (1.0 + vr);
                }
                self.cyl_pressure_psia -= dp;
            } else if self.pipe_pressure_psi > self.cyl_pressure_psia {
                // pipe vacuum falling: brakes applying
                let mut dp = dt_s * self.params.max_application_rate_psi_ps;
                if self.cyl_pressure_psia + dp > self.pipe_pressure_psi - dp * vr {
                    dp = (self.pipe_pressure_psi - self.cyl_pressure_psia) / (1.0 + vr);
                }
                self.cyl_pressure_psia += dp;
            }
        }

        self.compute_forces(skid, shoe_coeff_adj, shoe_retard_coeff_adj);
        self.update_sound_latch(controller);
        self.sample_trends(events);
    }

    fn compute_forces(&mut self, skid: bool, shoe_coeff_adj: f64, shoe_retard_coeff_adj: f64) {
        let fraction = ((ONE_ATMOSPHERE_PSI - self.cyl_pressure_psia)
            / self.params.max_force_pressure_psi)
            .clamp(0.0, 1.0);
        let mut f = self.params.max_brake_force_n * fraction;
        let handbrake_f = self.params.max_handbrake_force_n * self.handbrake_percent / 100.0;
        if f < handbrake_f {
            f = handbrake_f;
        }
        // Retard force at the wheel is independent of skid.
        self.brake_retard_force_n = f * shoe_retard_coeff_adj;
        self.brake_force_n = if skid {
            f * self.params.skid_friction
        } else {
            f * shoe_coeff_adj
        };
    }

    /// Twin-ejector model: the locomotive/tender cylinder can sit apart from
    /// the pipe through Apply/Lap, so its sound trigger is disabled until
    /// the brake returns to Release and the pressures agree again.
    fn update_sound_latch(&mut self, controller: BrakeControllerState) {
        if !self.params.is_engine_or_tender {
            return;
        }
        match controller {
            BrakeControllerState::Apply => self.brake_trigger_match = true,
            BrakeControllerState::Lap if self.brake_trigger_match => {
                self.sound_trigger_enabled = false;
            }
            BrakeControllerState::Release | BrakeControllerState::ReleaseOn
                if self.brake_trigger_match
                    && (self.cyl_pressure_psia - self.pipe_pressure_psi).abs()
                        < TRIGGER_REARM_BAND_PSI =>
            {
                self.brake_trigger_match = false;
                self.sound_trigger_enabled = true;
            }
            BrakeControllerState::Emergency => {
                self.brake_trigger_match = false;
                self.sound_trigger_enabled = true;
            }
            _ => {}
        }
    }

    fn sample_trends(&mut self, events: &mut Vec<BrakeEvent>) {
        self.sound_trigger_counter += 1;
        if self.sound_trigger_counter < SOUND_TRIGGER_PERIOD {
            return;
        }
        self.sound_trigger_counter = 0;

        if self.sound_trigger_enabled {
            let delta = self.cyl_pressure_psia - self.prev_cyl_pressure_psia;
            if let Some(ev) = self.cyl_trend.observe(delta) {
                // Cylinder vacuum increases as its pressure decreases.
                events.push(match ev {
                    TrendEvent::StartedFalling => BrakeEvent::TrainBrakePressureIncrease,
                    TrendEvent::StartedRising => BrakeEvent::TrainBrakePressureDecrease,
                    TrendEvent::StoppedChanging => BrakeEvent::TrainBrakePressureStoppedChanging,
                });
            }
            self.prev_cyl_pressure_psia = self.cyl_pressure_psia;
        }

        let delta = self.pipe_pressure_psi - self.prev_pipe_pressure_psi;
        if let Some(ev) = self.pipe_trend.observe(delta) {
            events.push(match ev {
                TrendEvent::StartedFalling => BrakeEvent::BrakePipePressureIncrease,
                TrendEvent::StartedRising => BrakeEvent::BrakePipePressureDecrease,
                TrendEvent::StoppedChanging => BrakeEvent::BrakePipePressureStoppedChanging,
            });
        }
        self.prev_pipe_pressure_psi = self.pipe_pressure_psi;
    }

    pub fn snapshot(&self) -> CarBrakeSnapshot {
        CarBrakeSnapshot {
            cyl_pressure_psia: self.cyl_pressure_psia,
            pipe_pressure_psi: self.pipe_pressure_psi,
        }
    }

    pub fn restore(&mut self, snapshot: &CarBrakeSnapshot) {
        self.cyl_pressure_psia = snapshot.cyl_pressure_psia;
        self.pipe_pressure_psi = snapshot.pipe_pressure_psi;
        self.prev_cyl_pressure_psia = snapshot.cyl_pressure_psia;
        self.prev_pipe_pressure_psi = snapshot.pipe_pressure_psi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wagon() -> CarVacuumBrake {
        CarVacuumBrake::new(CarBrakeParams::default()).unwrap()
    }

    fn run_ticks(
        brake: &mut CarVacuumBrake,
        n: usize,
        dt: f64,
        pipe: f64,
        events: &mut Vec<BrakeEvent>,
    ) {
        for _ in 0..n {
            brake.update(
                dt,
                pipe,
                BrakeControllerState::Lap,
                false,
                1.0,
                1.0,
                events,
            );
        }
    }

    #[test]
    fn cylinder_tracks_pipe_without_overshoot() {
        let mut b = wagon();
        b.initialize(false, 0.0); // both at atmosphere
        let target = vacuum_inhg_to_psia(21.0);
        let mut events = Vec::new();
        let mut prev = b.cyl_pressure_psia;
        for _ in 0..200 {
            b.update(
                0.1,
                target,
                BrakeControllerState::Lap,
                false,
                1.0,
                1.0,
                &mut events,
            );
            // monotone descent, never past the pipe pressure
            assert!(b.cyl_pressure_psia <= prev + 1e-12);
            assert!(b.cyl_pressure_psia >= target - 1e-9);
            prev = b.cyl_pressure_psia;
        }
        assert!((b.cyl_pressure_psia - target).abs() < 0.2);
    }

    #[test]
    fn applying_raises_cylinder_pressure() {
        let mut b = wagon();
        b.initialize(false, 21.0); // full service vacuum
        let mut events = Vec::new();
        run_ticks(&mut b, 100, 0.1, ONE_ATMOSPHERE_PSI, &mut events);
        assert!(b.cyl_pressure_psia > vacuum_inhg_to_psia(21.0));
        assert!(b.cyl_pressure_psia <= ONE_ATMOSPHERE_PSI + 1e-9);
    }

    #[test]
    fn brake_force_zero_at_atmosphere_full_at_max_vacuum() {
        let mut b = wagon();
        b.initialize(false, 0.0);
        let mut events = Vec::new();
        run_ticks(&mut b, 1, 0.1, ONE_ATMOSPHERE_PSI, &mut events);
        assert_eq!(b.brake_force_n, 0.0);

        // force fraction saturates once the differential passes max_force_pressure
        b.cyl_pressure_psia = ONE_ATMOSPHERE_PSI - 12.0;
        b.compute_forces(false, 1.0, 1.0);
        assert!((b.brake_force_n - 30_000.0).abs() < 1e-9);
    }

    #[test]
    fn handbrake_floors_brake_force() {
        let mut b = wagon();
        b.initialize(true, 0.0); // handbrake on, no vacuum
        b.compute_forces(false, 1.0, 1.0);
        assert!((b.brake_force_n - 20_000.0).abs() < 1e-9);
    }

    #[test]
    fn skid_replaces_shoe_coefficient() {
        let mut b = wagon();
        b.cyl_pressure_psia = ONE_ATMOSPHERE_PSI - 12.0;
        b.compute_forces(true, 1.0, 1.0);
        assert!((b.brake_force_n - 30_000.0 * 0.08).abs() < 1e-9);
        // retard force is unaffected by skid
        assert!((b.brake_retard_force_n - 30_000.0).abs() < 1e-9);
    }

    #[test]
    fn trend_events_fire_exactly_once_per_transition() {
        let mut b = wagon();
        b.initialize(false, 21.0);
        let mut events = Vec::new();
        // apply: pipe to atmosphere, cylinder pressure rises
        run_ticks(&mut b, 40, 0.1, ONE_ATMOSPHERE_PSI, &mut events);
        let rises = events
            .iter()
            .filter(|e| **e == BrakeEvent::TrainBrakePressureDecrease)
            .count();
        assert_eq!(rises, 1, "one vacuum-decrease event while applying");

        // hold: cylinder settles, exactly one stop event
        events.clear();
        run_ticks(&mut b, 400, 0.1, ONE_ATMOSPHERE_PSI, &mut events);
        let stops = events
            .iter()
            .filter(|e| **e == BrakeEvent::TrainBrakePressureStoppedChanging)
            .count();
        assert_eq!(stops, 1, "one stopped-changing event after settling");
    }

    #[test]
    fn engine_holds_cylinder_in_apply_and_lap() {
        let mut b = CarVacuumBrake::new(CarBrakeParams {
            is_engine_or_tender: true,
            ..CarBrakeParams::default()
        })
        .unwrap();
        b.initialize(false, 21.0);
        let before = b.cyl_pressure_psia;
        let mut events = Vec::new();
        for _ in 0..50 {
            b.update(
                0.1,
                ONE_ATMOSPHERE_PSI,
                BrakeControllerState::Apply,
                false,
                1.0,
                1.0,
                &mut events,
            );
        }
        assert_eq!(b.cyl_pressure_psia, before);
        // release lets it move again
        for _ in 0..50 {
            b.update(
                0.1,
                ONE_ATMOSPHERE_PSI,
                BrakeControllerState::Release,
                false,
                1.0,
                1.0,
                &mut events,
            );
        }
        assert!(b.cyl_pressure_psia > before);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut b = wagon();
        b.initialize(false, 18.0);
        let json = serde_json::to_string(&b.snapshot()).unwrap();
        let snap: CarBrakeSnapshot = serde_json::from_str(&json).unwrap();
        let mut other = wagon();
        other.restore(&snap);
        assert_eq!(other.cyl_pressure_psia, b.cyl_pressure_psia);
        assert_eq!(other.pipe_pressure_psi, b.pipe_pressure_psi);
    }
}
