//! The shared-dispatcher trampoline installed into the hardware vector table
//! for any line holding more than one subscriber.
//!
//! Only one real function pointer is ever installed per shared line; it
//! recovers which `(line, cpu)` it was installed for from its opaque `arg`,
//! then walks that line's subscriber chain under the global critical
//! section, invoking every handler whose status-register filter currently
//! reads as firing.

use crate::registry::{self, split_key};

/// Installed as the hardware vector handler for a shared line. `arg` is the
/// registry key for `(line, cpu)`, smuggled through as a pointer-sized
/// integer rather than a real pointer -- this trampoline dereferences
/// nothing, it only decodes.
pub(crate) fn shared_trampoline(arg: *mut ()) {
    let key = arg as usize as u8;
    let (line, cpu) = split_key(key);
    registry::with_state(|cs, state| {
        state.entry(line, cpu).dispatch(cs);
    });
}

/// Packs a `(line, cpu)` registry key into the opaque argument expected by
/// [`shared_trampoline`].
pub(crate) fn trampoline_arg(key: u8) -> *mut () {
    key as usize as *mut ()
}
