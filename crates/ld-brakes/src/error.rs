use thiserror::Error;

pub type BrakeResult<T> = Result<T, BrakeError>;

#[derive(Error, Debug)]
pub enum BrakeError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
