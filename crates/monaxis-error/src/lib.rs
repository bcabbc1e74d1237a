use thiserror::Error;

/// Primary error type for time-axis operations.
///
/// A single flat enumeration: every fallible operation on an axis returns
/// one of these. Variants carry just enough context to act on the failure
/// (the offending slot, the capacity that was hit) without borrowing from
/// axis internals.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AxisError {
    /// An argument failed validation before any state was touched.
    #[error("invalid parameter: {detail}")]
    InvalidParameter { detail: &'static str },

    /// Allocation failed while building axis-owned storage.
    #[error("out of memory")]
    OutOfMemory,

    /// Operation attempted against an axis that was never initialized.
    #[error("time axis is not initialized")]
    NotInitialized,

    /// Initialization attempted twice on the same axis handle.
    #[error("time axis is already initialized")]
    AlreadyInitialized,

    /// The slot lies in the past: behind the current slot on submission,
    /// or behind the reconstruction horizon on key retrieval.
    #[error("slot {target} is in the past (boundary slot {current})")]
    SlotInPast { target: u64, current: u64 },

    /// The conflict-group registry reached its hard cap.
    #[error("conflict group registry is full (limit {limit})")]
    ConflictGroupFull { limit: usize },

    /// The pending-request queue reached its configured capacity.
    #[error("request queue is full (limit {limit})")]
    RequestQueueFull { limit: usize },

    /// No retained anchor can serve as a reconstruction base.
    #[error("no anchor available for slot {slot}")]
    AnchorNotFound { slot: u64 },

    /// Replay from an anchor could not produce the requested slot.
    #[error("reconstruction failed: {detail}")]
    ReconstructionFailed { detail: &'static str },

    /// A conflict policy was supplied through the wrong entry point.
    #[error("invalid conflict policy: {detail}")]
    InvalidPolicy { detail: &'static str },

    /// Worker pool threads could not be started.
    #[error("worker pool failed: {detail}")]
    ThreadPoolFailed { detail: String },

    /// The referenced request, group, or key does not exist.
    #[error("not found")]
    NotFound,

    /// An anchor or key was produced under a different termination policy.
    ///
    /// Anchors are incompatible across policy semantics; the caller must
    /// regenerate against an axis with a matching policy hash or discard.
    #[error("termination policy hash mismatch: stored {stored:#018x}, axis {axis:#018x}")]
    PolicyMismatch { stored: u64, axis: u64 },

    /// The termination policy is immutable after axis creation.
    #[error("termination policy is locked after axis creation")]
    PolicyLocked,

    /// The axis has terminated; time cannot be advanced further.
    #[error("time axis has terminated")]
    Terminated,
}

/// Stable numeric codes for the error surface.
///
/// These are the wire/ABI codes reported to foreign callers; the numeric
/// values are load-bearing and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AxisCode {
    /// Successful result.
    Ok = 0,
    /// Argument validation failure.
    InvalidParameter = 1,
    /// Allocation failure.
    OutOfMemory = 2,
    /// Axis not initialized.
    NotInitialized = 3,
    /// Axis initialized twice.
    AlreadyInitialized = 4,
    /// Target slot already committed.
    SlotInPast = 5,
    /// Conflict-group registry full.
    ConflictGroupFull = 6,
    /// Request queue full.
    RequestQueueFull = 7,
    /// No anchor covers the slot.
    AnchorNotFound = 8,
    /// Replay could not produce the slot.
    ReconstructionFailed = 9,
    /// Policy rejected at registration.
    InvalidPolicy = 10,
    /// Worker pool startup failure.
    ThreadPoolFailed = 11,
    /// Lookup missed.
    NotFound = 12,
    /// Termination-policy hash mismatch.
    PolicyMismatch = 13,
    /// Termination policy immutable.
    PolicyLocked = 14,
    /// Axis lifecycle is Terminated.
    Terminated = 15,
}

/// Coarse failure taxonomy used to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad arguments or wrong lifecycle; recoverable, never mutates state.
    Caller,
    /// A configured bound was hit; recoverable by backoff.
    Capacity,
    /// The referenced entity does not exist; recoverable.
    Lookup,
    /// Semantic identity mismatch; regenerate or discard the artefact.
    Determinism,
    /// Resource acquisition failed; usually fatal for the axis.
    Resource,
    /// Invariant violation or corrupted state; never silent.
    Internal,
}

impl AxisError {
    /// Map this error to its stable numeric code.
    #[must_use]
    pub const fn code(&self) -> AxisCode {
        match self {
            Self::InvalidParameter { .. } => AxisCode::InvalidParameter,
            Self::OutOfMemory => AxisCode::OutOfMemory,
            Self::NotInitialized => AxisCode::NotInitialized,
            Self::AlreadyInitialized => AxisCode::AlreadyInitialized,
            Self::SlotInPast { .. } => AxisCode::SlotInPast,
            Self::ConflictGroupFull { .. } => AxisCode::ConflictGroupFull,
            Self::RequestQueueFull { .. } => AxisCode::RequestQueueFull,
            Self::AnchorNotFound { .. } => AxisCode::AnchorNotFound,
            Self::ReconstructionFailed { .. } => AxisCode::ReconstructionFailed,
            Self::InvalidPolicy { .. } => AxisCode::InvalidPolicy,
            Self::ThreadPoolFailed { .. } => AxisCode::ThreadPoolFailed,
            Self::NotFound => AxisCode::NotFound,
            Self::PolicyMismatch { .. } => AxisCode::PolicyMismatch,
            Self::PolicyLocked => AxisCode::PolicyLocked,
            Self::Terminated => AxisCode::Terminated,
        }
    }

    /// Classify this error for recovery decisions.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. }
            | Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::SlotInPast { .. }
            | Self::InvalidPolicy { .. }
            | Self::PolicyLocked
            | Self::Terminated => ErrorKind::Caller,
            Self::ConflictGroupFull { .. } | Self::RequestQueueFull { .. } => ErrorKind::Capacity,
            Self::NotFound | Self::AnchorNotFound { .. } => ErrorKind::Lookup,
            Self::PolicyMismatch { .. } => ErrorKind::Determinism,
            Self::OutOfMemory | Self::ThreadPoolFailed { .. } => ErrorKind::Resource,
            Self::ReconstructionFailed { .. } => ErrorKind::Internal,
        }
    }

    /// Whether a retry after backoff may succeed without caller changes.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Capacity)
    }

    /// Whether the failed operation is guaranteed to have left the axis
    /// unmutated.
    #[must_use]
    pub const fn leaves_state_unchanged(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Resource | ErrorKind::Internal)
    }

    /// Numeric code as `i32` (for process exit codes and FFI shims).
    #[must_use]
    pub const fn code_i32(&self) -> i32 {
        self.code() as i32
    }

    /// Create an `InvalidParameter` error with a static detail string.
    #[must_use]
    pub const fn invalid(detail: &'static str) -> Self {
        Self::InvalidParameter { detail }
    }

    /// Create a `ReconstructionFailed` error with a static detail string.
    #[must_use]
    pub const fn reconstruction(detail: &'static str) -> Self {
        Self::ReconstructionFailed { detail }
    }
}

/// Result type alias using [`AxisError`].
pub type Result<T> = std::result::Result<T, AxisError>;
