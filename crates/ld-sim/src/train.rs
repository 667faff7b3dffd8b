//! Train-level brake propagation: lead before followers.

use crate::context::TickInputs;
use crate::error::{SimError, SimResult};
use crate::locomotive::Locomotive;
use ld_brakes::{BrakeEvent, CarVacuumBrake, PipeContext};

/// A lead locomotive with its trailing cars.
///
/// Brake propagation is an explicit two-phase update: the lead pipe is
/// computed first, then every cylinder, lead's included, consumes the
/// post-update pipe pressure. Phase two touches disjoint per-car state and
/// may be parallelized without reordering reads.
pub struct Train {
    pub lead: Locomotive,
    pub wagons: Vec<CarVacuumBrake>,
}

impl Train {
    pub fn new(lead: Locomotive, wagons: Vec<CarVacuumBrake>) -> Self {
        Self { lead, wagons }
    }

    /// Two-phase vacuum brake update for the whole consist.
    pub fn update_brakes(&mut self, inputs: &TickInputs) -> SimResult<Vec<BrakeEvent>> {
        if inputs.elapsed_s <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "elapsed_s must be positive",
            });
        }
        let dt = inputs.elapsed_s;
        let mut events = Vec::new();

        // Phase 1: lead pipe.
        let Some(pipe) = self.lead.pipe.as_mut() else {
            return Err(SimError::InvalidArg {
                what: "lead locomotive carries no brake pipe",
            });
        };
        let ctx = PipeContext {
            controller: inputs.brake_controller,
            altitude_m: inputs.altitude_m,
            train_brake_system_volume_m3: inputs.train_brake_system_volume_m3,
            large_ejector_commanded: inputs.large_ejector_commanded,
        };
        pipe.update(dt, &ctx, &mut events);
        let pressure = pipe.pressure_psi;

        // Phase 2: every cylinder reads the post-update pipe pressure.
        self.lead.brake.update(
            dt,
            pressure,
            inputs.brake_controller,
            inputs.wheel_skid,
            inputs.brake_shoe_coeff_adj,
            inputs.brake_shoe_retard_coeff_adj,
            &mut events,
        );
        for car in &mut self.wagons {
            car.update(
                dt,
                pressure,
                inputs.brake_controller,
                inputs.wheel_skid,
                inputs.brake_shoe_coeff_adj,
                inputs.brake_shoe_retard_coeff_adj,
                &mut events,
            );
        }
        Ok(events)
    }

    /// Summed brake retarding force over the consist, N.
    pub fn total_brake_force_n(&self) -> f64 {
        self.lead.brake.brake_force_n
            + self
                .wagons
                .iter()
                .map(|c| c.brake_force_n)
                .sum::<f64>()
    }
}
