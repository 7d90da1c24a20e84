// ============================================================================
// reflow - Runtime Core
// ============================================================================

pub mod debug;
pub mod fault;
pub mod types;
