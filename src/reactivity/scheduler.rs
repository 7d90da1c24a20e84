// ============================================================================
// reflow - Scheduler
// Depth-bucketed dirty registry and the drain loop
// ============================================================================
//
// The scheduler owns the shared mutable state of the runtime: a mapping
// from depth to the set of guards dirty at that depth, plus the debug-only
// nesting stack. All mutation is serialized behind one reentrant mutex so
// that a render executing inside a drain pass (which already holds the
// mutex) can synchronously write a cell that stains other guards.
//
// Drain order: lowest depth first, arbitrary within a depth. Ancestors
// must be fully reconciled before descendants are considered, because an
// ancestor's render may replace its descendants wholesale, making any
// queued dirty descendant moot. Siblings at one depth cannot affect each
// other's dirtiness within a pass (dependencies are declared top-down),
// so order within a depth is unconstrained.
// ============================================================================

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::ReentrantMutex;
use tracing::{debug, trace, warn};

use crate::primitives::guard::Guard;
use crate::runtime::debug::debug_mode;
use crate::runtime::fault::Fault;

// =============================================================================
// SCHEDULER STATE
// =============================================================================

#[derive(Default)]
struct SchedulerState {
    /// Depth -> guards dirty at that depth. Buckets are emptied as guards
    /// are cleaned but never deleted, so iteration stays cheap over the
    /// lifetime of a stable hierarchy.
    dirty: BTreeMap<usize, Vec<Guard>>,

    /// Debug-mode nesting stack of currently-entered guards.
    stack: Vec<Guard>,
}

// =============================================================================
// SCHEDULER - The public handle
// =============================================================================

/// The process-wide render scheduler.
///
/// Cheap to clone; all clones share the same registry. Guards and cells
/// receive a handle at construction rather than looking one up ambiently,
/// which keeps the core testable without a live hosting environment.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

#[derive(Default)]
struct SchedulerInner {
    state: ReentrantMutex<RefCell<SchedulerState>>,
    initialized: AtomicBool,
}

impl Scheduler {
    /// Create a fresh scheduler with an empty dirty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // DIRTY REGISTRY
    // =========================================================================

    /// Mark a guard as pending render.
    ///
    /// Idempotent: staining an already-dirty guard is a no-op. Depth is
    /// recomputed from the guard's provider on every stain, so a guard
    /// whose hierarchy reshaped while it was already dirty is moved to the
    /// bucket for its current depth rather than left under a stale key.
    pub fn stain(&self, guard: &Guard) {
        let lock = self.inner.state.lock();
        let depth = guard.refresh_depth();

        match guard.bucket_key() {
            Some(current) if current == depth => return,
            Some(stale) => {
                // Dirty under an outdated key: move to the fresh bucket.
                let mut state = lock.borrow_mut();
                if let Some(bucket) = state.dirty.get_mut(&stale) {
                    bucket.retain(|g| !g.same(guard));
                }
                state.dirty.entry(depth).or_default().push(guard.clone());
            }
            None => {
                let mut state = lock.borrow_mut();
                state.dirty.entry(depth).or_default().push(guard.clone());
            }
        }

        guard.set_bucket_key(Some(depth));
        trace!(depth, "guard stained");
    }

    /// Unmark a guard as pending render.
    ///
    /// No-op (not an error) if the guard is not currently dirty.
    pub fn clean(&self, guard: &Guard) {
        let lock = self.inner.state.lock();
        let Some(depth) = guard.take_bucket_key() else {
            return;
        };

        let mut state = lock.borrow_mut();
        if let Some(bucket) = state.dirty.get_mut(&depth) {
            bucket.retain(|g| !g.same(guard));
        }
        trace!(depth, "guard cleaned");
    }

    // =========================================================================
    // DRAIN
    // =========================================================================

    /// Render every dirty guard, depth-ascending, until none remain.
    ///
    /// Hosts call this once per frame/tick. Each selected render runs with
    /// the registry mutex held, so concurrent cell writes from other
    /// threads are ordered around it; a cell write from *within* the
    /// render re-acquires the mutex reentrantly.
    ///
    /// A render that stains a strictly deeper guard converges: the loop
    /// simply continues until the registry is empty. A render that keeps
    /// staining its own or a shallower depth never converges - that is a
    /// structural defect in the component graph, outside this core's
    /// jurisdiction, and is deliberately not guarded against here.
    ///
    /// # Errors
    ///
    /// `Fault::StructuralIntegrity` if called before [`Scheduler::init`]
    /// has validated the initial state; any fault raised by a render.
    pub fn drain(&self) -> Result<(), Fault> {
        if !self.inner.initialized.load(Ordering::SeqCst) {
            warn!("drain called before init");
            return Err(Fault::structural(
                "drain called before init validated the initial state",
            ));
        }

        let mut rendered = 0usize;
        loop {
            let lock = self.inner.state.lock();
            let next = {
                let state = lock.borrow();
                state
                    .dirty
                    .values()
                    .find(|bucket| !bucket.is_empty())
                    .and_then(|bucket| bucket.first().cloned())
            };

            let Some(guard) = next else {
                break;
            };

            match guard.component() {
                Some(component) => {
                    // The render's enter() cleans the guard before it
                    // produces output, so progress is guaranteed for
                    // well-formed components.
                    component.render()?;
                    rendered += 1;
                }
                None => {
                    // The host dropped the component while it was dirty.
                    trace!(depth = guard.depth(), "discarding guard of dropped component");
                    self.clean(&guard);
                }
            }
            drop(lock);
        }

        if rendered > 0 {
            debug!(rendered, "drain pass complete");
        }
        Ok(())
    }

    /// Render the root once and validate that the registry drained empty.
    ///
    /// Every guard stains itself at construction, and a parent's render
    /// reaches each child through its inputs-setter, which performs the
    /// child's first render synchronously. A guard still dirty after the
    /// root render is therefore disconnected from every render path -
    /// a structural integrity violation, not a transient condition.
    ///
    /// Must precede the first [`Scheduler::drain`] call, and is one-shot:
    /// calling it on an already-initialized scheduler is a
    /// `Fault::StructuralIntegrity`.
    pub fn init(&self, root: &Guard) -> Result<(), Fault> {
        if self.inner.initialized.load(Ordering::SeqCst) {
            warn!("init called on an already-initialized scheduler");
            return Err(Fault::structural(
                "init called on an already-initialized scheduler",
            ));
        }

        let lock = self.inner.state.lock();

        let component = root.component().ok_or_else(|| {
            Fault::structural("root component was dropped before init")
        })?;
        component.render()?;

        let remaining: usize = lock.borrow().dirty.values().map(Vec::len).sum();
        if remaining != 0 {
            warn!(remaining, "disconnected components after initial render");
            return Err(Fault::structural(format!(
                "{remaining} component(s) registered but never reached by the \
                 initial render; check for a missing set-inputs call"
            )));
        }

        self.inner.initialized.store(true, Ordering::SeqCst);
        debug!("initial render validated");
        Ok(())
    }

    // =========================================================================
    // DEBUG NESTING STACK
    // =========================================================================

    /// Record a render entering, enforcing the top-down depth invariant.
    ///
    /// Skipped entirely when debug mode is off.
    pub fn push(&self, guard: &Guard) -> Result<(), Fault> {
        if !debug_mode() {
            return Ok(());
        }

        let lock = self.inner.state.lock();
        let mut state = lock.borrow_mut();
        if let Some(top) = state.stack.last() {
            if top.depth() >= guard.depth() {
                return Err(Fault::ordering(format!(
                    "nested render at depth {} does not strictly exceed the \
                     enclosing render at depth {}",
                    guard.depth(),
                    top.depth()
                )));
            }
        }
        state.stack.push(guard.clone());
        Ok(())
    }

    /// Record a render exiting, enforcing enter/exit pairing by identity.
    ///
    /// Skipped entirely when debug mode is off.
    pub fn pop(&self, guard: &Guard) -> Result<(), Fault> {
        if !debug_mode() {
            return Ok(());
        }

        let lock = self.inner.state.lock();
        let mut state = lock.borrow_mut();
        match state.stack.pop() {
            Some(top) if top.same(guard) => Ok(()),
            Some(top) => Err(Fault::ordering(format!(
                "exit at depth {} does not match the entered guard at depth {}",
                guard.depth(),
                top.depth()
            ))),
            None => Err(Fault::ordering("exit without a matching enter")),
        }
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    /// Run `f` with the registry mutex held.
    ///
    /// Cells use this to make compare-and-stain atomic with respect to
    /// concurrent writers and the drain loop.
    pub(crate) fn with_registry_locked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _lock = self.inner.state.lock();
        f()
    }

    /// Non-empty bucket sizes, ascending by depth. Test introspection only.
    #[cfg(test)]
    pub(crate) fn bucket_snapshot(&self) -> Vec<(usize, usize)> {
        let lock = self.inner.state.lock();
        let state = lock.borrow();
        state
            .dirty
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(depth, bucket)| (*depth, bucket.len()))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
