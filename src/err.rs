// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Status Codes
//!
//! Status codes returned by the dispatch core. A blocking call completes
//! with one of these as its wait status; every other fallible operation
//! returns them through [`Result`].
//!
//! Broken internal invariants are not status codes. They go through the
//! fatal path in [`crate::kernel::debug::internal_error`].

use core::fmt;

/// Status codes
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Success
    Successful = 0,

    /// The wait timed out before the thread was extracted
    Timeout = -1,

    /// The object was deleted while the thread waited
    ObjectDeleted = -2,

    /// The queue was flushed without granting the resource
    Unavailable = -3,

    /// The call would have to block but the caller asked not to wait
    NotReady = -4,

    /// Blocking would close a cycle of owners
    Deadlock = -5,

    /// The thread is more urgent than the queue's priority ceiling
    CeilingViolated = -6,

    /// The thread is not in a state that allows the operation
    IncorrectState = -7,

    /// The thread still owns resources
    ResourceInUse = -8,

    /// An object table is exhausted
    TooMany = -9,

    /// The caller does not own the resource
    NotOwner = -10,

    /// The priority is outside the configured range
    InvalidPriority = -11,
}

impl Status {
    /// Check if this is the success status
    pub const fn is_success(self) -> bool {
        self as i32 == 0
    }

    /// Convert to raw status code
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Map the success status to `Ok(())` and every other code to `Err`
    pub fn into_result(self) -> Result {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Get the status name as a string
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Successful => "SUCCESSFUL",
            Status::Timeout => "TIMEOUT",
            Status::ObjectDeleted => "OBJECT_DELETED",
            Status::Unavailable => "UNAVAILABLE",
            Status::NotReady => "NOT_READY",
            Status::Deadlock => "DEADLOCK",
            Status::CeilingViolated => "CEILING_VIOLATED",
            Status::IncorrectState => "INCORRECT_STATE",
            Status::ResourceInUse => "RESOURCE_IN_USE",
            Status::TooMany => "TOO_MANY",
            Status::NotOwner => "NOT_OWNER",
            Status::InvalidPriority => "INVALID_PRIORITY",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.as_raw())
    }
}

// Convert Status to the raw code for callers speaking integers
impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status as i32
    }
}

/// Result type for dispatch-core operations
pub type Result<T = ()> = core::result::Result<T, Status>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_raw() {
        assert_eq!(Status::Successful.as_raw(), 0);
        assert!(Status::Timeout.as_raw() < 0);
        assert_eq!(i32::from(Status::ObjectDeleted), -2);
    }

    #[test]
    fn test_into_result() {
        assert_eq!(Status::Successful.into_result(), Ok(()));
        assert_eq!(Status::Timeout.into_result(), Err(Status::Timeout));
    }
}
