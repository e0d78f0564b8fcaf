use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite value for {what} at step {step}")]
    NonFinite { what: &'static str, step: usize },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Series has {len} values but the axis has {steps} steps")]
    LengthMismatch { len: usize, steps: usize },

    #[error("Time axes differ: {what}")]
    AxisMismatch { what: &'static str },
}
