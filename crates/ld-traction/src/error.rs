use thiserror::Error;

pub type TractionResult<T> = Result<T, TractionError>;

#[derive(Error, Debug)]
pub enum TractionError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
