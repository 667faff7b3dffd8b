use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical value: {what}")]
    NonPhysical { what: &'static str },

    #[error(transparent)]
    Transmission(#[from] ld_transmission::TransmissionError),

    #[error(transparent)]
    Traction(#[from] ld_traction::TractionError),

    #[error(transparent)]
    Brake(#[from] ld_brakes::BrakeError),
}
