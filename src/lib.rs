// ============================================================================
// reflow - A Minimal Declarative Re-Rendering Runtime
// ============================================================================
//
// A component declares its output as a pure function of its inputs and its
// internal reactive cells. The runtime guarantees that whenever an input
// changes, the component's render is re-invoked exactly once per dirty
// cycle, in an order consistent with the hierarchy's depth, with side
// effects sequenced around each render.
//
// The pieces:
//
// - `Scheduler` - the depth-bucketed dirty registry and its drain loop.
//   Ancestors render before descendants within one pass, so structural
//   changes (a parent replacing its children) are never wasted on
//   now-obsolete children.
// - `Guard` - one per component; brackets each render with the enter/exit
//   protocol and sequences effect setup/cleanup pairs across renders.
// - `Cell` - a mutable value with explicit subscribers; writes
//   compare-and-stain under the scheduler's reentrant mutex, so equal
//   values never trigger a render.
// - `DepthProvider` - the only seam to the hosting hierarchy: anything
//   that can answer "how deep is this node" can be scheduled, including
//   headless synthetic trees.
//
// Dependencies are declared explicitly (at cell construction or via
// `used_by`), never inferred. A process-wide debug toggle enables the
// nesting-stack and subscriber-authorization checks during development;
// production skips them entirely.
// ============================================================================

pub mod macros;
pub mod primitives;
pub mod reactivity;
pub mod runtime;

// Re-export the full surface at the crate root for ergonomic access
pub use primitives::cell::{cell, Cell};
pub use primitives::guard::Guard;
pub use reactivity::scheduler::Scheduler;
pub use runtime::debug::{debug_mode, set_debug_mode};
pub use runtime::fault::Fault;
pub use runtime::types::{
    assign_if_changed, default_equals, CleanupFn, DepthProvider, EffectFn, EqualsFn, FnDepth,
    Render,
};

// =============================================================================
// TESTS
// =============================================================================
