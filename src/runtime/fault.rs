// ============================================================================
// reflow - Fault Type
// Fail-fast errors for programming defects in component declarations
// ============================================================================
//
// Every condition represented here is a defect in how a component was
// declared or wired, never a transient or environmental failure. The core
// surfaces them synchronously to the caller of the violated operation and
// never attempts recovery.
//
// `Ordering` and `UnauthorizedRead` are only ever produced in debug mode
// (see `runtime::debug`). With debug mode off, the checks that raise them
// are skipped entirely and a malformed program renders incorrectly instead
// of failing.
// ============================================================================

use thiserror::Error;

/// A fatal violation of the runtime's call contracts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// A component registered itself with the scheduler but was never
    /// reached by any render path (e.g. a missing initial set-inputs call),
    /// or an operation ran before `Scheduler::init` validated the tree.
    #[error("structural integrity violation: {0}")]
    StructuralIntegrity(String),

    /// A nested render did not respect the top-down depth invariant, or an
    /// enter/exit pair was mismatched. Debug mode only.
    #[error("ordering violation: {0}")]
    Ordering(String),

    /// A cell was read by a guard that never registered as its subscriber,
    /// meaning a change to the cell would not re-render the reader.
    /// Debug mode only.
    #[error("unauthorized read: {0}")]
    UnauthorizedRead(String),
}

impl Fault {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        Fault::StructuralIntegrity(msg.into())
    }

    pub(crate) fn ordering(msg: impl Into<String>) -> Self {
        Fault::Ordering(msg.into())
    }

    pub(crate) fn unauthorized(msg: impl Into<String>) -> Self {
        Fault::UnauthorizedRead(msg.into())
    }
}

// =============================================================================
// TESTS
// =============================================================================
