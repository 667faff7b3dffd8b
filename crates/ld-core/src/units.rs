// ld-core/src/units.rs

use uom::si::f64::{Pressure as UomPressure, Velocity as UomVelocity, Volume as UomVolume};

// Public canonical unit types (SI, f64)
pub type Pressure = UomPressure;
pub type Velocity = UomVelocity;
pub type Volume = UomVolume;

/// Standard atmosphere at sea level, psi.
pub const ONE_ATMOSPHERE_PSI: f64 = 14.695_95;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn psi(v: f64) -> Pressure {
    use uom::si::pressure::pound_force_per_square_inch;
    Pressure::new::<pound_force_per_square_inch>(v)
}

#[inline]
pub fn mps(v: f64) -> Velocity {
    use uom::si::velocity::meter_per_second;
    Velocity::new::<meter_per_second>(v)
}

/// Convert a gauge reading in inches of mercury to psi.
#[inline]
pub fn psi_from_inhg(v: f64) -> f64 {
    use uom::si::pressure::{inch_of_mercury, pound_force_per_square_inch};
    Pressure::new::<inch_of_mercury>(v).get::<pound_force_per_square_inch>()
}

/// Convert psi to inches of mercury.
#[inline]
pub fn inhg_from_psi(v: f64) -> f64 {
    use uom::si::pressure::{inch_of_mercury, pound_force_per_square_inch};
    Pressure::new::<pound_force_per_square_inch>(v).get::<inch_of_mercury>()
}

/// Absolute pipe pressure (psia) corresponding to a vacuum gauge reading in
/// inches of mercury. 0 inHg is atmospheric, higher vacuum is lower pressure.
#[inline]
pub fn vacuum_inhg_to_psia(vacuum_inhg: f64) -> f64 {
    ONE_ATMOSPHERE_PSI - psi_from_inhg(vacuum_inhg)
}

/// Vacuum gauge reading (inHg) corresponding to an absolute pressure in psia.
#[inline]
pub fn psia_to_vacuum_inhg(psia: f64) -> f64 {
    inhg_from_psi(ONE_ATMOSPHERE_PSI - psia)
}

#[inline]
pub fn m3_from_ft3(v: f64) -> f64 {
    use uom::si::volume::{cubic_foot, cubic_meter};
    Volume::new::<cubic_foot>(v).get::<cubic_meter>()
}

pub mod constants {
    /// Molar mass of Earth's air, kg/mol.
    pub const MOLAR_MASS_AIR_KG_PER_MOL: f64 = 0.02896;
    /// Gravitational acceleration, m/s².
    pub const GRAVITY_MPS2: f64 = 9.807;
    /// Standard temperature, K.
    pub const STANDARD_TEMPERATURE_K: f64 = 288.15;
    /// Universal gas constant, J/(mol·K).
    pub const UNIVERSAL_GAS_CONSTANT: f64 = 8.3143;
    /// Average sea-level pressure, Pa.
    pub const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;

    /// Barometric pressure ratio P/P0 at the given altitude:
    /// `P = P0 · exp(−M·g·h / (R·T))`.
    pub fn barometric_pressure_ratio(altitude_m: f64) -> f64 {
        (-MOLAR_MASS_AIR_KG_PER_MOL * GRAVITY_MPS2 * altitude_m
            / (STANDARD_TEMPERATURE_K * UNIVERSAL_GAS_CONSTANT))
            .exp()
    }
}
