// ============================================================================
// reflow - Reconciliation Guard
// Brackets each render with the enter/exit protocol and owns effect queues
// ============================================================================
//
// One guard per reactive component, owned exclusively by it; the scheduler
// reaches the component only weakly through the guard. The guard caches
// the component's depth (recomputed on every enter, since the hierarchy
// may have reshaped), and sequences effects around renders:
//
//   enter:  refresh depth -> push debug stack -> clean self
//           -> run queued cleanups in order
//   render body
//   exit:   pop debug stack -> run queued effects in declaration order,
//           collecting each returned cleanup for the *next* render
// ============================================================================

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::reactivity::scheduler::Scheduler;
use crate::runtime::fault::Fault;
use crate::runtime::types::{CleanupFn, DepthProvider, EffectFn, Render};

// =============================================================================
// GUARD - The public handle
// =============================================================================

/// The reconciliation guard bracketing a component's render.
///
/// Cheap to clone; clones share identity (the dirty registry and the debug
/// stack compare guards by identity, never by value).
#[derive(Clone)]
pub struct Guard {
    inner: Arc<GuardInner>,
}

struct GuardInner {
    scheduler: Scheduler,
    component: Weak<dyn Render>,
    provider: Box<dyn DepthProvider>,

    /// Depth cached at the last enter or stain.
    depth: AtomicUsize,

    /// Bucket key while dirty, `None` while clean. Maintained by the
    /// scheduler under the registry mutex; guarantees a guard occupies at
    /// most one bucket even when the hierarchy reshapes while dirty.
    bucket: Mutex<Option<usize>>,

    /// Whether this guard has ever been entered.
    entered_once: AtomicBool,

    /// Effects declared during the in-progress render.
    effects: Mutex<Vec<EffectFn>>,

    /// Cleanups collected at the last exit, run at the next enter.
    cleanups: Mutex<Vec<CleanupFn>>,
}

impl Guard {
    /// Bind a component to a depth provider and register it for rendering.
    ///
    /// Every newly created guard immediately stains itself, guaranteeing
    /// the component's first render happens during root init or the next
    /// drain. Components hold their guard and are themselves held weakly,
    /// so construction goes through [`Arc::new_cyclic`]:
    ///
    /// ```
    /// use std::sync::{Arc, Weak};
    /// use reflow::{Fault, Guard, Render, Scheduler};
    ///
    /// struct Label {
    ///     guard: Guard,
    /// }
    ///
    /// impl Render for Label {
    ///     fn render(&self) -> Result<(), Fault> {
    ///         self.guard.enter()?;
    ///         // ... write host attributes ...
    ///         self.guard.exit()
    ///     }
    /// }
    ///
    /// let scheduler = Scheduler::new();
    /// let label = Arc::new_cyclic(|weak: &Weak<Label>| Label {
    ///     guard: Guard::new(&scheduler, weak.clone(), 0usize),
    /// });
    /// scheduler.init(&label.guard).unwrap();
    /// ```
    pub fn new<C>(
        scheduler: &Scheduler,
        component: Weak<C>,
        provider: impl DepthProvider + 'static,
    ) -> Self
    where
        C: Render + 'static,
    {
        let component: Weak<dyn Render> = component;
        let depth = provider.depth();
        let guard = Self {
            inner: Arc::new(GuardInner {
                scheduler: scheduler.clone(),
                component,
                provider: Box::new(provider),
                depth: AtomicUsize::new(depth),
                bucket: Mutex::new(None),
                entered_once: AtomicBool::new(false),
                effects: Mutex::new(Vec::new()),
                cleanups: Mutex::new(Vec::new()),
            }),
        };
        guard.inner.scheduler.stain(&guard);
        guard
    }

    // =========================================================================
    // ENTER / EXIT PROTOCOL
    // =========================================================================

    /// Begin a render. Call exactly once, first thing in the render body,
    /// before reading any input or cell.
    ///
    /// # Errors
    ///
    /// `Fault::Ordering` (debug mode only) when this render does not
    /// strictly descend from the currently entered one.
    pub fn enter(&self) -> Result<(), Fault> {
        self.refresh_depth();
        self.inner.scheduler.push(self)?;
        self.inner.scheduler.clean(self);
        self.inner.entered_once.store(true, Ordering::SeqCst);

        // Cleanups from the previous render, in their declaration order,
        // before any effect of this render runs.
        let cleanups: Vec<CleanupFn> = std::mem::take(&mut *self.inner.cleanups.lock());
        for cleanup in cleanups {
            cleanup();
        }
        trace!(depth = self.depth(), "render entered");
        Ok(())
    }

    /// Finish a render. Call exactly once, last thing in the render body,
    /// after all host-visible output has been produced.
    ///
    /// Runs each effect declared during this render in declaration order
    /// and queues the cleanup it returns, preserving order, for the start
    /// of the next render.
    ///
    /// # Errors
    ///
    /// `Fault::Ordering` (debug mode only) when the exiting guard is not
    /// the one on top of the nesting stack.
    pub fn exit(&self) -> Result<(), Fault> {
        self.inner.scheduler.pop(self)?;

        let effects: Vec<EffectFn> = std::mem::take(&mut *self.inner.effects.lock());
        if !effects.is_empty() {
            let mut cleanups = self.inner.cleanups.lock();
            for effect in effects {
                cleanups.push(effect());
            }
        }
        trace!(depth = self.depth(), "render exited");
        Ok(())
    }

    /// Declare a deferred effect for the current render.
    ///
    /// The effect runs at the next `exit()`; the cleanup it returns runs
    /// at the start of the following render. Multiple effects accumulate
    /// for one render and are flushed together, in declaration order.
    ///
    /// # Example
    ///
    /// ```ignore
    /// self.guard.use_effect({
    ///     let host = self.host.clone();
    ///     move || {
    ///         let subscription = host.connect("pressed");
    ///         move || host.disconnect(subscription)
    ///     }
    /// });
    /// ```
    pub fn use_effect<F, C>(&self, effect: F)
    where
        F: FnOnce() -> C + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.inner
            .effects
            .lock()
            .push(Box::new(move || Box::new(effect()) as CleanupFn));
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// The depth cached at the last enter or stain.
    pub fn depth(&self) -> usize {
        self.inner.depth.load(Ordering::SeqCst)
    }

    /// Whether this guard is currently marked pending render.
    pub fn is_dirty(&self) -> bool {
        self.inner.bucket.lock().is_some()
    }

    /// Whether this guard has ever been entered. An inputs-setter uses
    /// this to force the mandatory first render even when every input
    /// matches its default.
    pub fn has_rendered(&self) -> bool {
        self.inner.entered_once.load(Ordering::SeqCst)
    }

    /// The scheduler this guard is registered with.
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// The owning component, if the host still holds it.
    pub fn component(&self) -> Option<Arc<dyn Render>> {
        self.inner.component.upgrade()
    }

    /// Identity comparison; the registry and debug stack never compare
    /// guards any other way.
    pub fn same(&self, other: &Guard) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // INTERNAL (scheduler-side bookkeeping)
    // =========================================================================

    /// Recompute depth from the provider and cache it.
    pub(crate) fn refresh_depth(&self) -> usize {
        let depth = self.inner.provider.depth();
        self.inner.depth.store(depth, Ordering::SeqCst);
        depth
    }

    /// The bucket this guard currently occupies, if dirty.
    pub(crate) fn bucket_key(&self) -> Option<usize> {
        *self.inner.bucket.lock()
    }

    pub(crate) fn set_bucket_key(&self, key: Option<usize>) {
        *self.inner.bucket.lock() = key;
    }

    pub(crate) fn take_bucket_key(&self) -> Option<usize> {
        self.inner.bucket.lock().take()
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("depth", &self.depth())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Component that re-declares one effect per render and logs the
    /// ordering of setups and cleanups.
    struct Effector {
        guard: Guard,
        log: Arc<Mutex<Vec<String>>>,
        generation: AtomicUsize,
    }

    impl Effector {
        fn new(scheduler: &Scheduler, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new_cyclic(|weak: &Weak<Effector>| Effector {
                guard: Guard::new(scheduler, weak.clone(), 0usize),
                log,
                generation: AtomicUsize::new(0),
            })
        }
    }

    impl Render for Effector {
        fn render(&self) -> Result<(), Fault> {
            self.guard.enter()?;
            let generation = self.generation.fetch_add(1, Ordering::SeqCst);
            let log = self.log.clone();
            self.guard.use_effect(move || {
                log.lock().push(format!("setup {generation}"));
                let log = log.clone();
                move || log.lock().push(format!("cleanup {generation}"))
            });
            self.guard.exit()
        }
    }

    #[test]
    fn guard_starts_dirty_and_enter_cleans() {
        let scheduler = Scheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let component = Effector::new(&scheduler, log);

        assert!(component.guard.is_dirty());
        assert!(!component.guard.has_rendered());

        component.render().unwrap();
        assert!(!component.guard.is_dirty());
        assert!(component.guard.has_rendered());
    }

    #[test]
    fn effect_pairing_across_consecutive_renders() {
        let scheduler = Scheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let component = Effector::new(&scheduler, log.clone());

        // First render: setup only.
        component.render().unwrap();
        assert_eq!(*log.lock(), vec!["setup 0"]);

        // Second render: previous cleanup runs first, then the new setup.
        component.render().unwrap();
        assert_eq!(*log.lock(), vec!["setup 0", "cleanup 0", "setup 1"]);

        // Third render: same pattern; setups never duplicate or skip.
        component.render().unwrap();
        assert_eq!(
            *log.lock(),
            vec!["setup 0", "cleanup 0", "setup 1", "cleanup 1", "setup 2"]
        );
    }

    #[test]
    fn multiple_effects_flush_in_declaration_order() {
        let scheduler = Scheduler::new();
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        struct Multi {
            guard: Guard,
            log: Arc<Mutex<Vec<&'static str>>>,
        }

        impl Render for Multi {
            fn render(&self) -> Result<(), Fault> {
                self.guard.enter()?;
                for (setup, cleanup) in
                    [("setup a", "cleanup a"), ("setup b", "cleanup b")]
                {
                    let log = self.log.clone();
                    self.guard.use_effect(move || {
                        log.lock().push(setup);
                        let log = log.clone();
                        move || log.lock().push(cleanup)
                    });
                }
                self.guard.exit()
            }
        }

        let component = Arc::new_cyclic(|weak: &Weak<Multi>| Multi {
            guard: Guard::new(&scheduler, weak.clone(), 0usize),
            log: log.clone(),
        });

        component.render().unwrap();
        assert_eq!(*log.lock(), vec!["setup a", "setup b"]);

        component.render().unwrap();
        assert_eq!(
            *log.lock(),
            vec!["setup a", "setup b", "cleanup a", "cleanup b", "setup a", "setup b"]
        );
    }

    #[test]
    fn guard_identity_is_by_handle_not_value() {
        let scheduler = Scheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Effector::new(&scheduler, log.clone());
        let b = Effector::new(&scheduler, log);

        assert!(a.guard.same(&a.guard.clone()));
        assert!(!a.guard.same(&b.guard));
    }
}
