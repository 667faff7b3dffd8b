//! Diesel prime-mover model: rate-limited RPM with torque/power tables.

use crate::error::{TransmissionError, TransmissionResult};
use ld_table::Table;
use serde::{Deserialize, Serialize};

/// Engine run state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    #[default]
    Stopped,
    Running,
}

/// Diesel engine configuration, handed over as already-parsed values.
///
/// Tables arrive as flat interleaved (x, y) pair lists; `torque_curve` maps
/// RPM to torque, the optional `power_curve` maps RPM to output watts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DieselEngineParams {
    pub idle_rpm: f64,
    pub max_rpm: f64,
    /// RPM under which the clutch cannot stay engaged.
    pub starting_rpm: f64,
    /// Maximum RPM slew, RPM per second.
    pub max_rpm_change_rate: f64,
    pub max_power_w: f64,
    pub torque_curve: Vec<f64>,
    pub power_curve: Option<Vec<f64>>,
}

impl Default for DieselEngineParams {
    fn default() -> Self {
        Self {
            idle_rpm: 300.0,
            max_rpm: 1200.0,
            starting_rpm: 200.0,
            max_rpm_change_rate: 100.0,
            max_power_w: 1_000_000.0,
            torque_curve: vec![300.0, 1.0, 1200.0, 1.0],
            power_curve: None,
        }
    }
}

/// Diesel engine: RPM slews toward the throttle demand (or follows the
/// shaft when the clutch couples it) at a bounded rate.
#[derive(Clone, Debug)]
pub struct DieselEngine {
    pub idle_rpm: f64,
    pub max_rpm: f64,
    pub starting_rpm: f64,
    max_rpm_change_rate: f64,
    max_power_w: f64,
    torque_tab: Table,
    power_tab: Option<Table>,
    real_rpm: f64,
    status: EngineStatus,
}

impl DieselEngine {
    pub fn new(params: &DieselEngineParams) -> TransmissionResult<Self> {
        if params.idle_rpm <= 0.0 || params.max_rpm <= params.idle_rpm {
            return Err(TransmissionError::InvalidArg {
                what: "engine needs 0 < idle_rpm < max_rpm",
            });
        }
        if params.max_rpm_change_rate <= 0.0 {
            return Err(TransmissionError::InvalidArg {
                what: "max_rpm_change_rate must be positive",
            });
        }
        Ok(Self {
            idle_rpm: params.idle_rpm,
            max_rpm: params.max_rpm,
            starting_rpm: params.starting_rpm,
            max_rpm_change_rate: params.max_rpm_change_rate,
            max_power_w: params.max_power_w,
            torque_tab: Table::from_pairs(&params.torque_curve),
            power_tab: params.power_curve.as_deref().map(Table::from_pairs),
            real_rpm: 0.0,
            status: EngineStatus::Stopped,
        })
    }

    pub fn start(&mut self) {
        self.status = EngineStatus::Running;
        if self.real_rpm < self.idle_rpm {
            self.real_rpm = self.idle_rpm;
        }
    }

    pub fn stop(&mut self) {
        self.status = EngineStatus::Stopped;
    }

    pub fn is_running(&self) -> bool {
        self.status == EngineStatus::Running
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn rpm(&self) -> f64 {
        self.real_rpm
    }

    pub fn set_rpm(&mut self, rpm: f64) {
        self.real_rpm = rpm.clamp(0.0, self.max_rpm);
    }

    /// Slew RPM toward the demand: throttle-proportional between idle and
    /// max, or the clutch-coupled shaft RPM when one is supplied. A stopped
    /// engine winds down to zero.
    pub fn update(&mut self, dt_s: f64, throttle_percent: f64, coupled_shaft_rpm: Option<f64>) {
        let demanded = if self.is_running() {
            match coupled_shaft_rpm {
                Some(shaft) => shaft.clamp(0.0, self.max_rpm),
                None => self.idle_rpm + (self.max_rpm - self.idle_rpm) * (throttle_percent / 100.0),
            }
        } else {
            0.0
        };
        let max_step = self.max_rpm_change_rate * dt_s;
        let delta = demanded - self.real_rpm;
        self.real_rpm += delta.clamp(-max_step, max_step);
    }

    /// Torque-table value at the given RPM.
    pub fn torque_at(&self, rpm: f64) -> f64 {
        self.torque_tab.get(rpm)
    }

    /// Largest torque-table value; zero for a degenerate table.
    pub fn torque_max(&self) -> f64 {
        self.torque_tab.max_y().0
    }

    /// Usable output power at the current RPM. Power table when configured,
    /// otherwise the linear RPM fraction of max power. Zero when stopped.
    pub fn output_power_w(&self) -> f64 {
        if !self.is_running() {
            return 0.0;
        }
        match &self.power_tab {
            Some(tab) => tab.get(self.real_rpm),
            None => {
                let span = self.max_rpm - self.idle_rpm;
                let frac = ((self.real_rpm - self.idle_rpm) / span).clamp(0.0, 1.0);
                self.max_power_w * frac
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DieselEngine {
        let mut e = DieselEngine::new(&DieselEngineParams {
            max_rpm_change_rate: 100.0,
            ..DieselEngineParams::default()
        })
        .unwrap();
        e.start();
        e
    }

    #[test]
    fn invalid_params_rejected() {
        assert!(
            DieselEngine::new(&DieselEngineParams {
                idle_rpm: 500.0,
                max_rpm: 400.0,
                ..DieselEngineParams::default()
            })
            .is_err()
        );
    }

    #[test]
    fn rpm_ramp_is_rate_limited() {
        let mut e = engine();
        assert_eq!(e.rpm(), 300.0);
        e.update(1.0, 100.0, None);
        // demanded 1200, slew capped at 100 RPM/s
        assert_eq!(e.rpm(), 400.0);
    }

    #[test]
    fn rpm_converges_to_demand() {
        let mut e = engine();
        for _ in 0..20 {
            e.update(1.0, 50.0, None);
        }
        // demanded = 300 + 900·0.5 = 750
        assert!((e.rpm() - 750.0).abs() < 1e-9);
    }

    #[test]
    fn coupled_shaft_overrides_throttle_demand() {
        let mut e = engine();
        e.update(10.0, 100.0, Some(600.0));
        assert!((e.rpm() - 600.0).abs() < 1e-9);
    }

    #[test]
    fn stopped_engine_winds_down_and_produces_no_power() {
        let mut e = engine();
        e.update(10.0, 100.0, None);
        e.stop();
        assert_eq!(e.output_power_w(), 0.0);
        for _ in 0..30 {
            e.update(1.0, 100.0, None);
        }
        assert_eq!(e.rpm(), 0.0);
    }

    #[test]
    fn power_fraction_tracks_rpm() {
        let mut e = engine();
        assert_eq!(e.output_power_w(), 0.0); // at idle
        for _ in 0..20 {
            e.update(1.0, 100.0, None);
        }
        assert!((e.output_power_w() - 1_000_000.0).abs() < 1e-6);
    }
}
