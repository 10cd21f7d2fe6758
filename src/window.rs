//! The flash-unsafe window: mass-masking every non-IRAM-resident line while
//! flash is electrically unreadable (e.g. during an in-place flash erase or
//! write), and restoring the prior mask afterward.
//!
//! Only the bits that were actually masked are ever restored: the saved mask
//! is `current_mask & non_iram`, and restoration OR's those bits back into
//! whatever the hardware mask happens to be at that point, rather than
//! overwriting it outright. A non-IRAM handler that disabled its own line
//! from inside the window stays disabled after the window closes.

use crate::hardware::Hardware;
use crate::registry;

/// Masks every line on the current CPU that isn't marked IRAM-resident,
/// saving the subset of the current hardware enable mask that was actually
/// non-IRAM so [`noniram_enable`] can restore exactly those bits. Idempotent:
/// a second call before the matching `enable` is a no-op in release builds
/// and a debug-only assertion failure, since it signals a caller bug
/// (unbalanced disable/enable nesting) rather than a recoverable runtime
/// condition.
pub(crate) fn noniram_disable<H: Hardware>() {
    let cpu = H::current_cpu();
    registry::with_state(|_cs, state| {
        if state.window_active[cpu as usize] {
            debug_assert!(false, "flash-unsafe window already active for this CPU");
            return;
        }
        let current = H::read_enable_mask(cpu);
        state.saved_mask[cpu as usize] = current & state.non_iram[cpu as usize];
        state.window_active[cpu as usize] = true;
        let masked = current & !state.non_iram[cpu as usize];
        H::write_enable_mask(cpu, masked);
    });
}

/// Restores the bits saved by the matching [`noniram_disable`], OR'd into
/// whatever the hardware mask currently is; never clobbers a line disabled
/// from inside the window.
pub(crate) fn noniram_enable<H: Hardware>() {
    let cpu = H::current_cpu();
    registry::with_state(|_cs, state| {
        if !state.window_active[cpu as usize] {
            debug_assert!(false, "flash-unsafe window was not active for this CPU");
            return;
        }
        state.window_active[cpu as usize] = false;
        H::write_enable_mask(cpu, H::read_enable_mask(cpu) | state.saved_mask[cpu as usize]);
    });
}
