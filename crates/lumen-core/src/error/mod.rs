//! Error taxonomy.
//!
//! Every fallible operation returns [`Result`]. Each [`Error`] maps onto exactly
//! one stable [`Status`] code and one [`ErrorClass`]. Public operations also
//! record their failure message in a per-thread slot readable through
//! [`last_error_message`].

mod last;
mod status;

pub use last::{clear_last_error, last_error_message};
pub use status::{ErrorClass, Status};

pub(crate) use last::Recorded;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("null pointer: {0}")]
    NullPointer(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid parameter: {len} bytes at offset {offset} exceed buffer size {size}")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("device lost: {0}")]
    DeviceLost(String),

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// Fence wait expired. Reported with the `InvalidParameter` status code.
    #[error("fence wait timed out after {timeout_ms} ms (value {value})")]
    Timeout { value: u64, timeout_ms: u64 },
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Error::NullPointer(_) => Status::NullPointer,
            Error::InvalidHandle(_) => Status::InvalidHandle,
            Error::InvalidParameter(_) | Error::OutOfBounds { .. } | Error::Timeout { .. } => {
                Status::InvalidParameter
            }
            Error::OutOfMemory(_) => Status::OutOfMemory,
            Error::Unsupported(_) => Status::Unsupported,
            Error::DeviceLost(_) => Status::DeviceLost,
            Error::Unimplemented(_) => Status::Unimplemented,
            Error::Internal(_) => Status::InternalError,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self.status().class() {
            Some(class) => class,
            None => ErrorClass::Internal,
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    #[inline]
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Error::DeviceLost(_))
    }

    pub(crate) fn invalid_parameter(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    pub(crate) fn invalid_handle(msg: impl Into<String>) -> Self {
        Error::InvalidHandle(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

impl From<&Error> for Status {
    fn from(err: &Error) -> Self {
        err.status()
    }
}

/// Status of a result, `Status::Ok` on success.
pub fn status_of<T>(result: &Result<T>) -> Status {
    match result {
        Ok(_) => Status::Ok,
        Err(err) => err.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let codes: Vec<i32> = Status::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![0, -1, -2, -3, -4, -5, -6, -7, -8]);
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(-9), None);
    }

    #[test]
    fn every_error_maps_to_one_class() {
        assert_eq!(Error::NullPointer("x".into()).class(), ErrorClass::Caller);
        assert_eq!(Error::OutOfBounds { offset: 4, len: 8, size: 8 }.class(), ErrorClass::Caller);
        assert_eq!(Error::OutOfMemory("x".into()).class(), ErrorClass::Exhaustion);
        assert_eq!(Error::Unimplemented("x".into()).class(), ErrorClass::Capability);
        assert_eq!(Error::DeviceLost("x".into()).class(), ErrorClass::DeviceLost);
        assert_eq!(Error::Internal("x".into()).class(), ErrorClass::Internal);
        assert!(ErrorClass::Exhaustion.is_retryable());
        assert!(!ErrorClass::Caller.is_retryable());
    }

    #[test]
    fn timeout_reports_invalid_parameter() {
        let err = Error::Timeout { value: 3, timeout_ms: 10 };
        assert!(err.is_timeout());
        assert_eq!(err.status(), Status::InvalidParameter);
        assert_eq!(status_of::<()>(&Err(err)), Status::InvalidParameter);
        assert_eq!(status_of(&Ok(1)), Status::Ok);
    }
}
