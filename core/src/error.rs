//! Error types for allocator operations.

/// Errors reported by the vector allocator.
///
/// All failures are synchronous and leave the allocator state untouched;
/// there is no retry machinery below this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrError {
    /// Invalid or conflicting allocation flags.
    InvalidFlags,
    /// Source id outside the interrupt matrix.
    InvalidSource,
    /// Forced vector out of range, or conflicting with an existing
    /// registration of the same source.
    InvalidVector,
    /// No usable vector satisfies the request.
    NotFound,
    /// The operation must run on the core owning the vector.
    CoreMismatch,
    /// The vector (or the per-core suspend slot) is already in use.
    InUse,
    /// Resume called without a matching suspend.
    NotSuspended,
}

impl core::fmt::Display for IntrError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            IntrError::InvalidFlags => "invalid allocation flags",
            IntrError::InvalidSource => "source id out of range",
            IntrError::InvalidVector => "invalid or conflicting vector",
            IntrError::NotFound => "no usable vector",
            IntrError::CoreMismatch => "wrong core for this operation",
            IntrError::InUse => "vector already in use",
            IntrError::NotSuspended => "no suspended interrupts to resume",
        };
        f.write_str(msg)
    }
}

/// Result type for allocator operations.
pub type IntrResult<T> = Result<T, IntrError>;
