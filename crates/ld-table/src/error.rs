use thiserror::Error;

pub type TableResult<T> = Result<T, TableError>;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invariant violated: {what}")]
    Invariant { what: &'static str },
}
