//! Gear records and gearbox configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the gear lever is operated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GearBoxOperation {
    #[default]
    Manual,
    Automatic,
    Semiautomatic,
}

/// Engine-braking behavior of the box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GearBoxEngineBraking {
    #[default]
    None,
    DirectDrive,
    AllGears,
}

/// One gear, immutable after the box is built.
///
/// `ratio` converts engine RPM to road speed (m/s per RPM), so
/// `shaft_rpm = speed / ratio`.
#[derive(Clone, Debug, PartialEq)]
pub struct Gear {
    pub min_speed_mps: f64,
    pub max_speed_mps: f64,
    pub ratio: f64,
    pub max_tractive_force_n: f64,
    pub overspeed_percentage: f64,
    pub back_load_force_n: f64,
    pub coasting_force_n: f64,
    pub up_gear_proportion: f64,
    pub down_gear_proportion: f64,
    pub free_wheel: bool,
    pub is_converter: bool,
    pub is_direct_drive: bool,
}

/// Gearbox configuration, handed over as already-parsed values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GearBoxParams {
    pub number_of_gears: usize,
    pub direct_drive_gear: usize,
    pub operation: GearBoxOperation,
    pub engine_braking: GearBoxEngineBraking,
    pub max_speed_for_gears_mps: Vec<f64>,
    pub min_speed_for_gears_mps: Vec<f64>,
    pub free_wheel_for_gears: Vec<bool>,
    pub hydro_is_converter: Vec<bool>,
    pub max_tractive_force_for_gears_n: Vec<f64>,
    pub overspeed_percentage_for_failure: f64,
    pub back_load_force_n: f64,
    pub coasting_force_n: f64,
    pub up_gear_proportion: f64,
    pub down_gear_proportion: f64,
    pub time_for_speed_change_s: f64,
}

impl Default for GearBoxParams {
    fn default() -> Self {
        Self {
            number_of_gears: 1,
            direct_drive_gear: 1,
            operation: GearBoxOperation::Manual,
            engine_braking: GearBoxEngineBraking::None,
            max_speed_for_gears_mps: Vec::new(),
            min_speed_for_gears_mps: Vec::new(),
            free_wheel_for_gears: Vec::new(),
            hydro_is_converter: Vec::new(),
            max_tractive_force_for_gears_n: Vec::new(),
            overspeed_percentage_for_failure: 150.0,
            back_load_force_n: 1000.0,
            coasting_force_n: 500.0,
            up_gear_proportion: 0.85,
            down_gear_proportion: 0.35,
            time_for_speed_change_s: 0.01,
        }
    }
}

impl GearBoxParams {
    /// True when the required per-gear lists cover the declared gear count.
    /// Min speeds, free-wheel and converter flags have per-gear defaults.
    pub fn is_complete(&self) -> bool {
        let n = self.number_of_gears;
        n > 0
            && self.max_speed_for_gears_mps.len() >= n
            && self.max_tractive_force_for_gears_n.len() >= n
    }

    /// Build the gear list. Incomplete parameters degrade to a single
    /// default gear with a warning; construction never fails. Min speeds
    /// default to the max speeds (no speed-trigger band), free-wheel and
    /// converter flags default to off.
    pub fn build_gears(&self, engine_max_rpm: f64) -> Vec<Gear> {
        if !self.is_complete() {
            warn!("some of the gearbox parameters are missing, default physics will be used");
            return vec![self.default_gear(engine_max_rpm)];
        }
        let rpm = if engine_max_rpm > 0.0 {
            engine_max_rpm
        } else {
            1.0
        };
        (0..self.number_of_gears)
            .map(|i| Gear {
                min_speed_mps: self
                    .min_speed_for_gears_mps
                    .get(i)
                    .copied()
                    .unwrap_or(self.max_speed_for_gears_mps[i]),
                max_speed_mps: self.max_speed_for_gears_mps[i],
                ratio: self.max_speed_for_gears_mps[i] / rpm,
                max_tractive_force_n: self.max_tractive_force_for_gears_n[i],
                overspeed_percentage: self.overspeed_percentage_for_failure,
                back_load_force_n: self.back_load_force_n,
                coasting_force_n: self.coasting_force_n,
                up_gear_proportion: self.up_gear_proportion,
                down_gear_proportion: self.down_gear_proportion,
                free_wheel: self.free_wheel_for_gears.get(i).copied().unwrap_or(false),
                is_converter: self.hydro_is_converter.get(i).copied().unwrap_or(false),
                is_direct_drive: self.direct_drive_gear == self.number_of_gears,
            })
            .collect()
    }

    fn default_gear(&self, engine_max_rpm: f64) -> Gear {
        let max_speed_mps = 10.0;
        Gear {
            min_speed_mps: max_speed_mps,
            max_speed_mps,
            ratio: max_speed_mps / engine_max_rpm.max(1.0),
            max_tractive_force_n: 10_000.0,
            overspeed_percentage: self.overspeed_percentage_for_failure,
            back_load_force_n: self.back_load_force_n,
            coasting_force_n: self.coasting_force_n,
            up_gear_proportion: self.up_gear_proportion,
            down_gear_proportion: self.down_gear_proportion,
            free_wheel: false,
            is_converter: false,
            is_direct_drive: true,
        }
    }
}
