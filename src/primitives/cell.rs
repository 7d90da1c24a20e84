// ============================================================================
// reflow - Reactive Cell
// A dependency-tracked value container with explicit subscribers
// ============================================================================
//
// A cell holds one equality-comparable value and an ordered list of
// subscriber guards. Writes go through the scheduler's registry mutex so
// that compare-and-stain is atomic with respect to concurrent writers and
// the drain loop; a write from inside a render re-acquires the mutex
// reentrantly. Equal values never stain - that is the sole de-duplication
// mechanism; there is no batching of different values.
//
// Subscription is explicit: the owning guard at construction, plus any
// guard registered later via `used_by`. In debug mode a read from an
// unregistered guard is an UnauthorizedRead fault, catching the silent
// missed-dependency bug where a component reads a cell it would never be
// re-rendered for.
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::primitives::guard::Guard;
use crate::reactivity::scheduler::Scheduler;
use crate::runtime::debug::debug_mode;
use crate::runtime::fault::Fault;
use crate::runtime::types::{default_equals, EqualsFn};

// =============================================================================
// CELL<T> - The public cell handle
// =============================================================================

/// A mutable reactive value cell.
///
/// Cheap to clone; clones share the same value and subscriber list, so a
/// cell can be handed to host-side event sources (input handlers, timers)
/// that write it from any thread.
///
/// # Example
///
/// ```ignore
/// let is_active = Cell::new(&self.guard, false);
///
/// // In the render body:
/// let label = if is_active.get(&self.guard)? { "On" } else { "Off" };
///
/// // From a host event:
/// is_active.set(true); // stains the owning guard
/// ```
pub struct Cell<T> {
    inner: Arc<CellInner<T>>,
}

struct CellInner<T> {
    scheduler: Scheduler,
    value: Mutex<T>,
    equals: EqualsFn<T>,
    subscribers: Mutex<Vec<Guard>>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Cell<T> {
    /// Create a cell owned by `owner`, pre-registered as its sole
    /// initial subscriber.
    pub fn new(owner: &Guard, value: T) -> Self
    where
        T: PartialEq,
    {
        Self::new_with_equals(owner, value, default_equals::<T>)
    }

    /// Create a cell with a custom equality predicate.
    ///
    /// Useful for values where `PartialEq` is wrong or unavailable, or to
    /// force every write through with `|_, _| false`.
    pub fn new_with_equals(owner: &Guard, value: T, equals: EqualsFn<T>) -> Self {
        Self {
            inner: Arc::new(CellInner {
                scheduler: owner.scheduler().clone(),
                value: Mutex::new(value),
                equals,
                subscribers: Mutex::new(vec![owner.clone()]),
            }),
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Current value (cloning).
    ///
    /// # Errors
    ///
    /// `Fault::UnauthorizedRead` (debug mode only) when `reader` is not a
    /// registered subscriber of this cell.
    pub fn get(&self, reader: &Guard) -> Result<T, Fault>
    where
        T: Clone,
    {
        self.authorize(reader)?;
        Ok(self.inner.value.lock().clone())
    }

    /// Access the current value with a closure (avoids cloning), under the
    /// same authorization rule as [`Cell::get`].
    pub fn with<R>(&self, reader: &Guard, f: impl FnOnce(&T) -> R) -> Result<R, Fault> {
        self.authorize(reader)?;
        Ok(f(&self.inner.value.lock()))
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Set the cell's value, staining every registered subscriber when the
    /// value actually changed.
    ///
    /// Runs under the scheduler's registry mutex: concurrent writes from
    /// independent host threads are totally ordered, and a write from
    /// within a render (which already holds the mutex inside a drain pass)
    /// re-acquires it without deadlock.
    ///
    /// Returns whether the value changed. Setting an equal value is a
    /// complete no-op: no mutation, no staining, no render.
    pub fn set(&self, value: T) -> bool {
        self.inner.scheduler.with_registry_locked(|| {
            let changed = {
                let mut current = self.inner.value.lock();
                if (self.inner.equals)(&current, &value) {
                    false
                } else {
                    *current = value;
                    true
                }
            };

            if changed {
                // Collect first: staining must not run under the
                // subscriber-list lock.
                let subscribers: Vec<Guard> = self.inner.subscribers.lock().clone();
                trace!(subscribers = subscribers.len(), "cell write stains");
                for guard in &subscribers {
                    self.inner.scheduler.stain(guard);
                }
            }
            changed
        })
    }

    /// Read-modify-write under the registry mutex, with [`Cell::set`]
    /// change semantics.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool
    where
        T: Clone,
    {
        self.inner.scheduler.with_registry_locked(|| {
            let mut next = self.inner.value.lock().clone();
            f(&mut next);
            self.set(next)
        })
    }

    // =========================================================================
    // SUBSCRIPTION
    // =========================================================================

    /// Register an additional subscriber, for cells shared across
    /// components (a broadcast dependency rather than a single owner).
    /// Registering an already-subscribed guard is a no-op.
    pub fn used_by(&self, subscriber: &Guard) {
        let mut subscribers = self.inner.subscribers.lock();
        if !subscribers.iter().any(|g| g.same(subscriber)) {
            subscribers.push(subscriber.clone());
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn authorize(&self, reader: &Guard) -> Result<(), Fault> {
        if !debug_mode() {
            return Ok(());
        }
        let subscribed = self.inner.subscribers.lock().iter().any(|g| g.same(reader));
        if subscribed {
            Ok(())
        } else {
            Err(Fault::unauthorized(format!(
                "guard at depth {} read a cell it never subscribed to",
                reader.depth()
            )))
        }
    }
}

/// Create a cell owned by `owner` - convenience matching the common
/// construction in render-adjacent code.
pub fn cell<T>(owner: &Guard, value: T) -> Cell<T>
where
    T: PartialEq + Send + 'static,
{
    Cell::new(owner, value)
}

// =============================================================================
// TESTS
// =============================================================================
