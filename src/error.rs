//! Error types for bloomforge operations.
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error type is
//! [`BloomError`]. Errors fall into two families:
//!
//! - **Allocation failures**: the requested buffer cannot be provided, either because the
//!   allocator refused it or because the size itself is not representable (including the
//!   unbounded size implied by a zero target false positive rate).
//! - **Usage errors**: set algebra between filters that do not share a bucket layout or an
//!   allocator.
//!
//! Degenerate inputs (zero expected items, a target rate of 1 or more) are not errors: they
//! produce a zero-capacity filter.
//!
//! A failed mutating call always leaves the filter exactly as it was before the call.
//!
//! # Examples
//!
//! ```
//! use bloomforge::{BloomError, Filter};
//!
//! let err = Filter::<u64, 5>::with_false_positive_rate(1, 0.0).unwrap_err();
//! assert!(err.is_allocation_failure());
//! ```

#![allow(clippy::module_name_repetitions)]

use thiserror::Error;

/// Result type alias for bloomforge operations.
pub type Result<T> = std::result::Result<T, BloomError>;

/// Errors that can occur while building, resizing or combining filters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BloomError {
    /// The allocator could not provide a buffer of the requested size.
    #[error("failed to allocate {bytes} bytes for the filter array")]
    AllocationFailed {
        /// Number of bytes requested from the allocator.
        bytes: usize,
    },

    /// The requested capacity cannot be represented in memory.
    ///
    /// Raised when size arithmetic overflows, and when sizing from a target false
    /// positive rate of zero (or less) with a nonzero item count.
    #[error("filter capacity overflow: {message}")]
    CapacityOverflow {
        /// Description of the request that overflowed.
        message: String,
    },

    /// The target false positive rate is not a number.
    #[error("invalid target false positive rate {fpr}")]
    InvalidFalsePositiveRate {
        /// The rate that was provided.
        fpr: f64,
    },

    /// Two filters cannot be combined.
    ///
    /// Set algebra requires the same bucket range and compatible allocators.
    #[error("cannot combine incompatible filters: {reason}")]
    IncompatibleFilters {
        /// Description of the incompatibility.
        reason: String,
    },
}

impl BloomError {
    /// Create an `AllocationFailed` error.
    #[must_use]
    pub fn allocation_failed(bytes: usize) -> Self {
        Self::AllocationFailed { bytes }
    }

    /// Create a `CapacityOverflow` error.
    #[must_use]
    pub fn capacity_overflow(message: impl Into<String>) -> Self {
        Self::CapacityOverflow {
            message: message.into(),
        }
    }

    /// Create an `InvalidFalsePositiveRate` error.
    #[must_use]
    pub fn invalid_fpr(fpr: f64) -> Self {
        Self::InvalidFalsePositiveRate { fpr }
    }

    /// Create an `IncompatibleFilters` error.
    #[must_use]
    pub fn incompatible_filters(reason: impl Into<String>) -> Self {
        Self::IncompatibleFilters {
            reason: reason.into(),
        }
    }

    /// Whether this error means the requested memory could not be obtained.
    #[must_use]
    pub fn is_allocation_failure(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailed { .. } | Self::CapacityOverflow { .. }
        )
    }

    /// Whether this error reports a caller mistake rather than a resource problem.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleFilters { .. } | Self::InvalidFalsePositiveRate { .. }
        )
    }
}
