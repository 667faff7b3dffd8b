use thiserror::Error;

pub type TransmissionResult<T> = Result<T, TransmissionError>;

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },
}
