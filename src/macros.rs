// ============================================================================
// reflow - Inputs-Setter Macro
// ============================================================================

/// Implement the body of a component's inputs-setter: diff every declared
/// input, assign the ones that changed, and re-render exactly once if
/// anything did.
///
/// The mandatory first render is forced even when every input matches its
/// default (a fresh guard has never rendered), so a parent reaching a
/// newly created child through its setter always produces the child's
/// initial render - which is what lets `Scheduler::init` validate that no
/// component was left disconnected.
///
/// # Usage
///
/// ```ignore
/// impl List {
///     fn set_inputs(&self, n_items: usize, title: String) -> Result<(), Fault> {
///         set_inputs!(self.guard, self.render(),
///             self.n_items => n_items,
///             self.title => title,
///         )
///     }
/// }
///
/// // Zero-input components still declare a setter:
/// fn set_inputs(&self) -> Result<(), Fault> {
///     set_inputs!(self.guard, self.render())
/// }
/// ```
///
/// Input slots are `parking_lot::Mutex` fields diffed with
/// [`assign_if_changed`](crate::assign_if_changed).
#[macro_export]
macro_rules! set_inputs {
    ($guard:expr, $render:expr $(, $slot:expr => $value:expr )* $(,)?) => {{
        #[allow(unused_mut)]
        let mut __changed = false;
        $( __changed |= $crate::assign_if_changed(&$slot, $value); )*
        if __changed || !$guard.has_rendered() {
            $render
        } else {
            Ok(())
        }
    }};
}
