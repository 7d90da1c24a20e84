// ============================================================================
// reflow - Primitives
// ============================================================================

pub mod cell;
pub mod guard;
