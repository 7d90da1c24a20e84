// ============================================================================
// reflow - Type Definitions
// The seams between the scheduler core and its host environment
// ============================================================================
//
// Two traits decouple the core from any concrete hierarchy:
//
// - `Render` is the component contract: a single render operation that
//   brackets its body with the guard's enter/exit protocol. The scheduler
//   only ever holds components weakly through their guards.
// - `DepthProvider` answers "how deep is this node" for whatever hosts the
//   component. Any hierarchy that can answer that question can be
//   scheduled, including synthetic or headless ones.
// ============================================================================

use parking_lot::Mutex;

use crate::runtime::fault::Fault;

// =============================================================================
// TYPE ALIASES
// =============================================================================

/// Cleanup produced by an effect, run before the guard's next render.
pub type CleanupFn = Box<dyn FnOnce() + Send>;

/// Deferred effect queued during a render, run after the render commits.
/// Its return value is the paired cleanup.
pub type EffectFn = Box<dyn FnOnce() -> CleanupFn + Send>;

/// Equality predicate used by cells to suppress no-op writes.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// The default cell equality: `PartialEq`.
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

// =============================================================================
// RENDER - The component contract
// =============================================================================

/// A unit of declarative render logic.
///
/// A component implements exactly one render operation. Between the guard's
/// `enter()` and `exit()` calls, the body must read only declared inputs and
/// declared cells, must produce its host-visible attribute writes along
/// every control path, and may declare effects via `use_effect`.
///
/// Renders are invoked by the scheduler's drain loop (and, nested, by a
/// parent's inputs-setter), so implementations must be callable from any
/// host thread.
pub trait Render: Send + Sync {
    /// Recompute this component's output from its current inputs and cells.
    fn render(&self) -> Result<(), Fault>;
}

// =============================================================================
// DEPTH PROVIDER - The hierarchy seam
// =============================================================================

/// Reports a component's integer depth within its hosting hierarchy.
///
/// Depth is used solely to order rendering: ancestors (smaller depth) are
/// reconciled before descendants within one drain pass. The provider is
/// queried on every guard enter and on every stain, so a reshaping
/// hierarchy is picked up without any explicit notification.
pub trait DepthProvider: Send + Sync {
    /// The current depth of the modeled entity.
    fn depth(&self) -> usize;
}

/// A fixed depth, for headless hierarchies and tests.
impl DepthProvider for usize {
    fn depth(&self) -> usize {
        *self
    }
}

/// Closure-backed depth provider, for hierarchies that reshape.
///
/// # Example
///
/// ```
/// use reflow::{DepthProvider, FnDepth};
///
/// let provider = FnDepth(|| 3);
/// assert_eq!(provider.depth(), 3);
/// ```
pub struct FnDepth<F>(pub F);

impl<F> DepthProvider for FnDepth<F>
where
    F: Fn() -> usize + Send + Sync,
{
    fn depth(&self) -> usize {
        (self.0)()
    }
}

// =============================================================================
// INPUT DIFFING
// =============================================================================

/// Assign `value` into `slot` only if it differs, reporting whether it did.
///
/// This is the runtime half of a component's inputs-setter: the setter
/// diffs every declared input with this helper and re-renders once if any
/// of them changed (see the [`set_inputs!`](crate::set_inputs) macro).
pub fn assign_if_changed<T: PartialEq>(slot: &Mutex<T>, value: T) -> bool {
    let mut slot = slot.lock();
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

// =============================================================================
// TESTS
// =============================================================================
