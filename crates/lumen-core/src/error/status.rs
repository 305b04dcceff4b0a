use std::fmt;

/// Stable status codes shared with every binding layer.
///
/// The numeric values are part of the public contract and never change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    NullPointer = -1,
    InvalidHandle = -2,
    InvalidParameter = -3,
    OutOfMemory = -4,
    Unsupported = -5,
    DeviceLost = -6,
    Unimplemented = -7,
    InternalError = -8,
}

impl Status {
    pub const ALL: [Status; 9] = [
        Status::Ok,
        Status::NullPointer,
        Status::InvalidHandle,
        Status::InvalidParameter,
        Status::OutOfMemory,
        Status::Unsupported,
        Status::DeviceLost,
        Status::Unimplemented,
        Status::InternalError,
    ];

    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Error class of a failing status; `None` for `Ok`.
    pub const fn class(self) -> Option<ErrorClass> {
        match self {
            Status::Ok => None,
            Status::NullPointer | Status::InvalidHandle | Status::InvalidParameter => {
                Some(ErrorClass::Caller)
            }
            Status::OutOfMemory => Some(ErrorClass::Exhaustion),
            Status::Unsupported | Status::Unimplemented => Some(ErrorClass::Capability),
            Status::DeviceLost => Some(ErrorClass::DeviceLost),
            Status::InternalError => Some(ErrorClass::Internal),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::NullPointer => "null_pointer",
            Status::InvalidHandle => "invalid_handle",
            Status::InvalidParameter => "invalid_parameter",
            Status::OutOfMemory => "out_of_memory",
            Status::Unsupported => "unsupported",
            Status::DeviceLost => "device_lost",
            Status::Unimplemented => "unimplemented",
            Status::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a caller is expected to react to a failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Malformed arguments or handles. Retrying the same call fails again.
    Caller,
    /// Allocation failure. The caller may free resources and retry.
    Exhaustion,
    /// Feature absent on the selected backend or adapter.
    Capability,
    /// The device is gone; tear down every dependent and recreate.
    DeviceLost,
    /// Contract violation inside the engine or a backend.
    Internal,
}

impl ErrorClass {
    /// Whether the failed operation may succeed later without recreating anything.
    #[inline]
    pub const fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::Exhaustion)
    }

    #[inline]
    pub const fn requires_recreation(self) -> bool {
        matches!(self, ErrorClass::DeviceLost)
    }
}
