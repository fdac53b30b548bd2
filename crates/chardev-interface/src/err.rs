use thiserror::Error;

use crate::Minor;

pub type Result<T = ()> = core::result::Result<T, Error>;

pub const EAGAIN: i32 = 11;
pub const EFAULT: i32 = 14;
pub const EBUSY: i32 = 16;
pub const ENODEV: i32 = 19;
pub const EINVAL: i32 = 22;
pub const ERESTARTSYS: i32 = 512;

/// Failure of a single call against one instance.
///
/// None of these is fatal to the module: a failed call leaves the instance
/// in the state it had before the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Non-blocking caller found the instance in the wrong state.
    #[error("operation would block")]
    WouldBlock,
    /// A blocking wait was cancelled by a signal. The whole call may be
    /// restarted.
    #[error("interrupted by signal")]
    Interrupted,
    /// The caller supplied memory could not be fully read or written.
    #[error("bad address")]
    FaultyBuffer,
    /// Malformed control input.
    #[error("invalid argument")]
    InvalidArgument,
    #[error("no such device: minor {0}")]
    NoDevice(Minor),
    #[error("device or resource busy")]
    Busy,
}

impl Error {
    /// Linux errno reported for this error, as a positive number.
    pub const fn errno(&self) -> i32 {
        match self {
            Error::WouldBlock => EAGAIN,
            Error::Interrupted => ERESTARTSYS,
            Error::FaultyBuffer => EFAULT,
            Error::InvalidArgument => EINVAL,
            Error::NoDevice(_) => ENODEV,
            Error::Busy => EBUSY,
        }
    }

    /// Whether the same call may succeed later without changing arguments.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Error::WouldBlock | Error::Interrupted)
    }
}
