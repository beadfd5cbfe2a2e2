//! Physics Error Types
//!
//! Unified error type for the engine. Operations that can fail (entity
//! lookup, body construction from degenerate geometry, constraint validation,
//! composite tree edits) return `Result<T, PhysicsError>` instead of raw
//! booleans or panicking.

use crate::common::{BodyId, CompositeId, ConstraintId};
use core::fmt;

/// Unified error type for physics operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicsError {
    /// A body handle does not resolve to a live body.
    UnknownBody {
        /// The handle that failed to resolve
        id: BodyId,
    },
    /// A constraint handle does not resolve to a live constraint.
    UnknownConstraint {
        /// The handle that failed to resolve
        id: ConstraintId,
    },
    /// A composite handle does not resolve to a live composite.
    UnknownComposite {
        /// The handle that failed to resolve
        id: CompositeId,
    },
    /// A body could not be built or modified as requested.
    InvalidBody {
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// A constraint was configured without a usable endpoint or anchor.
    InvalidConstraint {
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// A composite tree edit would corrupt the tree (e.g. a cycle).
    InvalidComposite {
        /// Human-readable description of the problem
        reason: &'static str,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBody { id } => write!(f, "unknown {id}"),
            Self::UnknownConstraint { id } => write!(f, "unknown {id}"),
            Self::UnknownComposite { id } => write!(f, "unknown {id}"),
            Self::InvalidBody { reason } => write!(f, "invalid body: {reason}"),
            Self::InvalidConstraint { reason } => {
                write!(f, "invalid constraint: {reason}")
            }
            Self::InvalidComposite { reason } => {
                write!(f, "invalid composite: {reason}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PhysicsError {}

// ============================================================================
// Tests
// ============================================================================
