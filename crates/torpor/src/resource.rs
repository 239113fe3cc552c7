//! Resource accounting for sandboxed execution.
//!
//! The heap reports every allocation to a [`ResourceTracker`], and the VM
//! checks frame depth on every call. Hosts pick the tracker when starting a
//! run: [`NoLimitTracker`] for trusted workloads, [`LimitedTracker`] to bound
//! allocation count, memory, and recursion.

use serde::{Deserialize, Serialize};

use crate::exception_private::ExcType;

/// Frame-depth ceiling applied even without configured limits.
///
/// Frames live on the Rust heap, so this bounds runaway recursion in the
/// sandboxed program rather than the host stack.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Depth ceiling for nested data operations (equality, repr, conversion).
///
/// These recurse on the Rust stack, so the bound is much tighter than the
/// frame limit.
pub const MAX_DATA_RECURSION_DEPTH: u32 = 200;

/// A resource limit was exceeded during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceError {
    /// Too many heap allocations.
    AllocationLimit,
    /// Estimated memory use exceeded the configured ceiling.
    MemoryLimit,
    /// Frame stack grew past the recursion limit.
    RecursionLimit,
}

impl ResourceError {
    /// The Python exception type this error surfaces as.
    #[must_use]
    pub(crate) fn exc_type(self) -> ExcType {
        match self {
            Self::AllocationLimit | Self::MemoryLimit => ExcType::MemoryError,
            Self::RecursionLimit => ExcType::RecursionError,
        }
    }

    /// The message carried by the surfaced exception.
    #[must_use]
    pub(crate) fn message(self) -> &'static str {
        match self {
            Self::AllocationLimit => "allocation limit exceeded",
            Self::MemoryLimit => "memory limit exceeded",
            Self::RecursionLimit => "maximum recursion depth exceeded",
        }
    }
}

/// Limits enforced by [`LimitedTracker`].
///
/// `None` disables the corresponding check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of heap allocations.
    pub max_allocations: Option<usize>,
    /// Maximum estimated heap memory, in bytes.
    pub max_memory: Option<usize>,
    /// Maximum frame stack depth; defaults to [`DEFAULT_MAX_RECURSION_DEPTH`].
    pub max_recursion_depth: Option<usize>,
}

/// Observes allocations and frame pushes during execution.
///
/// Implementations are owned by the heap and serialized with suspended state,
/// so a resumed run continues from the same accounting.
pub trait ResourceTracker: Serialize + serde::de::DeserializeOwned + std::fmt::Debug {
    /// Called for every heap allocation with an estimated size in bytes.
    fn on_allocate(&mut self, bytes: usize) -> Result<(), ResourceError>;

    /// Called before pushing a frame; `depth` is the stack depth after the push.
    fn check_frame_depth(&self, depth: usize) -> Result<(), ResourceError>;
}

/// Tracker that only enforces the default recursion ceiling.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    fn on_allocate(&mut self, _bytes: usize) -> Result<(), ResourceError> {
        Ok(())
    }

    fn check_frame_depth(&self, depth: usize) -> Result<(), ResourceError> {
        if depth > DEFAULT_MAX_RECURSION_DEPTH {
            Err(ResourceError::RecursionLimit)
        } else {
            Ok(())
        }
    }
}

/// Tracker enforcing [`ResourceLimits`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    allocations: usize,
    memory: usize,
}

impl LimitedTracker {
    /// Creates a tracker with the given limits.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            allocations: 0,
            memory: 0,
        }
    }

    /// Number of allocations observed so far.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Estimated bytes allocated so far.
    #[must_use]
    pub fn memory(&self) -> usize {
        self.memory
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, bytes: usize) -> Result<(), ResourceError> {
        self.allocations += 1;
        self.memory += bytes;
        if let Some(max) = self.limits.max_allocations
            && self.allocations > max
        {
            return Err(ResourceError::AllocationLimit);
        }
        if let Some(max) = self.limits.max_memory
            && self.memory > max
        {
            return Err(ResourceError::MemoryLimit);
        }
        Ok(())
    }

    fn check_frame_depth(&self, depth: usize) -> Result<(), ResourceError> {
        let max = self.limits.max_recursion_depth.unwrap_or(DEFAULT_MAX_RECURSION_DEPTH);
        if depth > max {
            Err(ResourceError::RecursionLimit)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_tracker_counts_allocations() {
        let mut tracker = LimitedTracker::new(ResourceLimits {
            max_allocations: Some(2),
            ..ResourceLimits::default()
        });
        assert!(tracker.on_allocate(8).is_ok());
        assert!(tracker.on_allocate(8).is_ok());
        assert_eq!(tracker.on_allocate(8), Err(ResourceError::AllocationLimit));
    }

    #[test]
    fn recursion_ceiling_applies_without_limits() {
        let tracker = NoLimitTracker;
        assert!(tracker.check_frame_depth(DEFAULT_MAX_RECURSION_DEPTH).is_ok());
        assert_eq!(
            tracker.check_frame_depth(DEFAULT_MAX_RECURSION_DEPTH + 1),
            Err(ResourceError::RecursionLimit)
        );
    }
}
