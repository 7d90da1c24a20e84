// ============================================================================
// reflow - Debug Mode Toggle
// Process-wide switch for the development-only invariant checks
// ============================================================================
//
// One flag gates both the scheduler's nesting stack and the cell
// subscriber-authorization check. Production (flag off) skips the checks
// entirely, accepting that malformed programs become silent incorrect
// renders rather than faults. Observable behavior for well-formed programs
// is identical either way.
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_MODE: AtomicBool = AtomicBool::new(false);

/// Enable or disable the debug-mode invariant checks for the whole process.
///
/// Typically called once at startup, before any scheduler exists.
pub fn set_debug_mode(enabled: bool) {
    DEBUG_MODE.store(enabled, Ordering::SeqCst);
}

/// Whether debug-mode invariant checks are currently enabled.
pub fn debug_mode() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

// =============================================================================
// TESTS
// =============================================================================
