// ============================================================================
// reflow - Reactivity
// ============================================================================

pub mod scheduler;
