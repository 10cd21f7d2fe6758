//! The seam between this crate's allocation logic and the actual hardware:
//! the vector table, `INTENABLE`/`INTCLEAR`, and the peripheral routing
//! matrix.
//!
//! This crate only consumes these operations, never implements them.
//! Expressing the boundary as a trait rather than a set of `extern "C"`
//! symbols keeps [`crate::allocator`] and [`crate::Controller`] generic and
//! host-testable, the same split used at peripheral boundaries elsewhere in
//! this style of HAL.

/// An installed interrupt handler: a plain function pointer plus an opaque
/// context pointer, passed back to the handler verbatim.
pub type IrqHandler = fn(*mut ());

/// Platform integration point: everything this crate needs from the
/// environment's interrupt controller and peripheral routing matrix.
///
/// Implementations are expected to be zero-sized types used only for their
/// `impl`; [`crate::Controller`] takes `H: Hardware` as a type parameter
/// rather than a trait object; so every call an application makes after
/// construction monomorphizes down to direct register access, not a vtable
/// indirection.
pub trait Hardware {
    /// Returns which CPU is executing the call.
    fn current_cpu() -> u8;

    /// Installs `handler` (with its opaque `arg`) into `line`'s hardware
    /// vector table slot, or restores the default "unhandled" stub if
    /// `handler` is `None`.
    ///
    /// # Safety
    ///
    /// The caller must ensure `line` is not concurrently being dispatched
    /// on another CPU while this runs, which in practice means calling this
    /// only from inside the crate's global critical section.
    unsafe fn install_vector(line: u8, handler: Option<IrqHandler>, arg: *mut ());

    /// Whether `line`'s currently-installed vector on `cpu` is something
    /// other than the default "unhandled" stub (i.e. it was installed
    /// out-of-band, bypassing this crate).
    fn has_custom_vector(line: u8, cpu: u8) -> bool;

    /// Enables `line` in the CPU's `INTENABLE`-equivalent register.
    fn enable_line(line: u8);

    /// Disables `line` in the CPU's `INTENABLE`-equivalent register.
    fn disable_line(line: u8);

    /// Clears `line`'s pending bit (used after installing an edge-triggered
    /// handler).
    fn clear_pending(line: u8);

    /// Programs the peripheral routing matrix: `source` on `cpu` now routes
    /// to `line`. Never called for internal sources, which pin a line
    /// without going through the routing matrix.
    fn route(cpu: u8, source: u32, line: u8);

    /// Reads the current hardware interrupt-enable mask for `cpu` (bit *i*
    /// set means line *i* is enabled).
    fn read_enable_mask(cpu: u8) -> u32;

    /// Overwrites the hardware interrupt-enable mask for `cpu`.
    fn write_enable_mask(cpu: u8, mask: u32);
}
