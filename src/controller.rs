//! The public entry point: binds the Allocator, Vector Registry, Installer,
//! Shared Dispatcher, and Flash-Unsafe Window into the API callers actually
//! use.
//!
//! `Controller<H>` is zero-sized; every method monomorphizes down to direct
//! calls against `H`'s register accesses, so there is no dynamic dispatch or
//! per-instance state beyond the single global registry in [`crate::registry`].

use core::marker::PhantomData;

use crate::allocator;
use crate::catalog::{self, InternalSource};
use crate::dispatcher;
use crate::error::{Error, Result};
use crate::flags::IrqFlags;
use crate::hardware::{Hardware, IrqHandler};
use crate::registry::{self, Handle, VectorFlags};
use crate::window;
use crate::{NUM_CPUS, NUM_LINES};

/// Identity of an interrupt source, as seen by the allocator: either an
/// ordinary peripheral source routed through the matrix, or one of the
/// fixed internal sources that pins a specific line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// A peripheral source identity, routed via the matrix to the chosen line.
    Peripheral(u32),
    /// A fixed internal source that forces a specific line.
    Internal(InternalSource),
}

/// The interrupt allocation core for one `Hardware` implementation.
///
/// Carries no state of its own; all mutable state lives behind the
/// crate-global critical section in [`crate::registry`].
pub struct Controller<H: Hardware> {
    _hw: PhantomData<H>,
}

impl<H: Hardware> Controller<H> {
    pub const fn new() -> Self {
        Self { _hw: PhantomData }
    }

    /// Allocates a line for `source` under `flags`, installing `handler`
    /// directly (exclusive mode) or behind the shared dispatcher.
    ///
    /// Shorthand for [`Self::alloc_with_status`] with no status-register
    /// filter.
    pub fn alloc(&self, source: Source, flags: IrqFlags, handler: Option<IrqHandler>, arg: *mut ()) -> Result<Handle> {
        self.alloc_with_status(source, flags, None, 0, handler, arg)
    }

    /// Allocates a line for `source` under `flags`, optionally filtering a
    /// shared subscription on a peripheral status register.
    pub fn alloc_with_status(
        &self,
        source: Source,
        flags: IrqFlags,
        status_reg: Option<*const u32>,
        status_mask: u32,
        handler: Option<IrqHandler>,
        arg: *mut (),
    ) -> Result<Handle> {
        validate_alloc_request(flags, status_reg, status_mask, handler)?;

        let force = match source {
            Source::Internal(s) => catalog::forced_line(s),
            Source::Peripheral(_) => None,
        };
        let cpu = H::current_cpu();

        let handle = registry::with_state(|_cs, state| {
            let line = allocator::choose_line::<H>(state, flags, cpu, force).ok_or(Error::NotFound)?;

            let subscriber_slot = if flags.contains(IrqFlags::SHARED) {
                let h = handler.expect("validated above: SHARED requires a handler");
                let slot = state
                    .entry_mut(line, cpu)
                    .push_subscriber(status_reg, status_mask, h, arg)
                    .ok_or(Error::NotFound)?;
                state.entry_mut(line, cpu).flags.insert(VectorFlags::SHARED_MODE);
                let key = registry::key(line, cpu);
                unsafe {
                    H::install_vector(line, Some(dispatcher::shared_trampoline), dispatcher::trampoline_arg(key));
                }
                Some(slot)
            } else {
                state.entry_mut(line, cpu).flags = VectorFlags::EXCLUSIVE_MODE;
                if let Some(h) = handler {
                    unsafe {
                        H::install_vector(line, Some(h), arg);
                    }
                }
                if flags.contains(IrqFlags::EDGE) {
                    H::clear_pending(line);
                }
                None
            };

            if flags.contains(IrqFlags::IRAM) {
                state.entry_mut(line, cpu).flags.insert(VectorFlags::FLASH_RESIDENT);
                state.non_iram[cpu as usize] &= !(1u32 << line);
            } else {
                state.entry_mut(line, cpu).flags.remove(VectorFlags::FLASH_RESIDENT);
                state.non_iram[cpu as usize] |= 1u32 << line;
            }

            if let Source::Peripheral(src) = source {
                H::route(cpu, src, line);
            }

            H::enable_line(line);

            Ok(Handle {
                key: registry::key(line, cpu),
                subscriber_slot,
            })
        })?;

        #[cfg(feature = "defmt")]
        defmt::trace!(
            "intr_alloc: source={:?} flags allocated on line={} cpu={}",
            source,
            handle.line(),
            handle.cpu()
        );

        Ok(handle)
    }

    /// Releases `handle`. For a shared subscriber, unlinks it from its
    /// line's chain; if that empties the chain, or if `handle` was
    /// exclusive, the line itself is torn down: disabled, reverted to the
    /// default vector stub, and excluded from the residence mask.
    ///
    /// Must be called from the CPU that allocated `handle`.
    pub fn free(&self, handle: Handle) -> Result<()> {
        let cpu = H::current_cpu();
        if handle.cpu() != cpu {
            return Err(Error::InvalidArg);
        }
        let line = handle.line();

        registry::with_state(|_cs, state| {
            let now_empty = match handle.subscriber_slot {
                Some(slot) => state.entry_mut(line, cpu).remove_subscriber(slot),
                None => true,
            };

            if !now_empty {
                return;
            }

            if handle.subscriber_slot.is_some() {
                state.entry_mut(line, cpu).flags.remove(VectorFlags::SHARED_MODE);
            }
            state.entry_mut(line, cpu).flags.remove(VectorFlags::EXCLUSIVE_MODE);
            state.entry_mut(line, cpu).flags.remove(VectorFlags::RESERVED_AT_RUNTIME);
            state.entry_mut(line, cpu).flags.remove(VectorFlags::FLASH_RESIDENT);

            H::disable_line(line);
            unsafe {
                H::install_vector(line, None, core::ptr::null_mut());
            }
            state.non_iram[cpu as usize] &= !(1u32 << line);
        });

        #[cfg(feature = "defmt")]
        defmt::trace!("intr_alloc: freed line={} cpu={}", line, cpu);

        Ok(())
    }

    /// Enables `handle`'s line. Rejected for shared subscribers (the line's
    /// enable state is collective) and for off-CPU callers.
    pub fn enable(&self, handle: Handle) -> Result<()> {
        self.toggle(handle, true)
    }

    /// Disables `handle`'s line. Same restrictions as [`Self::enable`].
    pub fn disable(&self, handle: Handle) -> Result<()> {
        self.toggle(handle, false)
    }

    fn toggle(&self, handle: Handle, on: bool) -> Result<()> {
        if handle.subscriber_slot.is_some() {
            return Err(Error::InvalidArg);
        }
        if handle.cpu() != H::current_cpu() {
            return Err(Error::InvalidArg);
        }
        if on {
            H::enable_line(handle.line());
        } else {
            H::disable_line(handle.line());
        }
        Ok(())
    }

    pub fn get_line(&self, handle: Handle) -> u8 {
        handle.line()
    }

    pub fn get_cpu(&self, handle: Handle) -> u8 {
        handle.cpu()
    }

    /// Advisory: marks `(line, cpu)` as shared before any allocation lands
    /// on it, so every subsequent `alloc` onto that line must be shared.
    pub fn mark_shared(&self, line: u8, cpu: u8, flash_resident: bool) -> Result<()> {
        validate_line_cpu(line, cpu)?;
        registry::with_state(|_cs, state| {
            let entry = state.entry_mut(line, cpu);
            entry.flags.insert(VectorFlags::SHARED_MODE);
            if flash_resident {
                entry.flags.insert(VectorFlags::FLASH_RESIDENT);
            }
        });
        Ok(())
    }

    /// Advisory: reserves `(line, cpu)` so the allocator never picks it.
    pub fn reserve(&self, line: u8, cpu: u8) -> Result<()> {
        validate_line_cpu(line, cpu)?;
        registry::with_state(|_cs, state| {
            state.entry_mut(line, cpu).flags.insert(VectorFlags::RESERVED_AT_RUNTIME);
        });
        Ok(())
    }

    /// Masks every non-flash-resident line on the current CPU. Must be
    /// paired with a matching [`Self::noniram_enable`].
    pub fn noniram_disable(&self) {
        window::noniram_disable::<H>();
    }

    /// Restores the hardware enable mask saved by the matching
    /// [`Self::noniram_disable`].
    pub fn noniram_enable(&self) {
        window::noniram_enable::<H>();
    }
}

impl<H: Hardware> Default for Controller<H> {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_alloc_request(
    flags: IrqFlags,
    status_reg: Option<*const u32>,
    status_mask: u32,
    handler: Option<IrqHandler>,
) -> Result<()> {
    if flags.contains(IrqFlags::SHARED) && flags.contains(IrqFlags::EDGE) {
        return Err(Error::InvalidArg);
    }
    if flags.contains(IrqFlags::HIGH) && handler.is_some() {
        return Err(Error::InvalidArg);
    }
    if flags.contains(IrqFlags::SHARED) && handler.is_none() {
        return Err(Error::InvalidArg);
    }
    if status_reg.is_some() && (!flags.contains(IrqFlags::SHARED) || status_mask == 0) {
        return Err(Error::InvalidArg);
    }
    Ok(())
}

fn validate_line_cpu(line: u8, cpu: u8) -> Result<()> {
    if line as usize >= NUM_LINES || cpu as usize >= NUM_CPUS {
        return Err(Error::InvalidArg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

    static INSTALLED_AT: AtomicU8 = AtomicU8::new(255);
    static ENABLE_CALLS: AtomicU32 = AtomicU32::new(0);
    static DISABLE_CALLS: AtomicU32 = AtomicU32::new(0);
    static ROUTE_SOURCE_LINE: AtomicU32 = AtomicU32::new(u32::MAX);

    struct MockHw;
    impl Hardware for MockHw {
        fn current_cpu() -> u8 {
            0
        }
        unsafe fn install_vector(line: u8, _handler: Option<IrqHandler>, _arg: *mut ()) {
            INSTALLED_AT.store(line, Ordering::SeqCst);
        }
        fn has_custom_vector(_line: u8, _cpu: u8) -> bool {
            false
        }
        fn enable_line(_line: u8) {
            ENABLE_CALLS.fetch_add(1, Ordering::SeqCst);
        }
        fn disable_line(_line: u8) {
            DISABLE_CALLS.fetch_add(1, Ordering::SeqCst);
        }
        fn clear_pending(_line: u8) {}
        fn route(_cpu: u8, source: u32, line: u8) {
            ROUTE_SOURCE_LINE.store(source * 100 + line as u32, Ordering::SeqCst);
        }
        fn read_enable_mask(_cpu: u8) -> u32 {
            0
        }
        fn write_enable_mask(_cpu: u8, _mask: u32) {}
    }

    fn handler_a(_: *mut ()) {}

    #[test]
    fn shared_and_edge_is_invalid() {
        let ctl = Controller::<MockHw>::new();
        let err = ctl
            .alloc(Source::Peripheral(1), IrqFlags::SHARED | IrqFlags::EDGE, Some(handler_a), core::ptr::null_mut())
            .unwrap_err();
        assert_eq!(err, Error::InvalidArg);
    }

    #[test]
    fn high_with_handler_is_invalid() {
        let ctl = Controller::<MockHw>::new();
        let err = ctl
            .alloc(Source::Peripheral(1), IrqFlags::HIGH, Some(handler_a), core::ptr::null_mut())
            .unwrap_err();
        assert_eq!(err, Error::InvalidArg);
    }

    #[test]
    fn shared_without_handler_is_invalid() {
        let ctl = Controller::<MockHw>::new();
        let err = ctl.alloc(Source::Peripheral(1), IrqFlags::SHARED, None, core::ptr::null_mut()).unwrap_err();
        assert_eq!(err, Error::InvalidArg);
    }

    #[test]
    fn status_reg_without_shared_is_invalid() {
        let ctl = Controller::<MockHw>::new();
        static STATUS: AtomicU32 = AtomicU32::new(0);
        let err = ctl
            .alloc_with_status(
                Source::Peripheral(1),
                IrqFlags::empty(),
                Some(STATUS.as_ptr() as *const u32),
                1,
                Some(handler_a),
                core::ptr::null_mut(),
            )
            .unwrap_err();
        assert_eq!(err, Error::InvalidArg);
    }

    #[test]
    fn forced_internal_source_lands_on_its_line() {
        let ctl = Controller::<MockHw>::new();
        let handle = ctl
            .alloc(Source::Internal(InternalSource::CoreTimer1), IrqFlags::LEVEL3, Some(handler_a), core::ptr::null_mut())
            .unwrap();
        assert_eq!(handle.line(), 15);
        ctl.free(handle).unwrap();
    }

    #[test]
    fn free_from_other_cpu_is_invalid() {
        let ctl = Controller::<MockHw>::new();
        let handle = Handle {
            key: registry::key(9, 1),
            subscriber_slot: None,
        };
        assert_eq!(ctl.free(handle).unwrap_err(), Error::InvalidArg);
    }

    #[test]
    fn enable_rejected_for_shared_subscriber() {
        let ctl = Controller::<MockHw>::new();
        let handle = Handle {
            key: registry::key(9, 0),
            subscriber_slot: Some(0),
        };
        assert_eq!(ctl.enable(handle).unwrap_err(), Error::InvalidArg);
    }

    static HITS_1: AtomicU32 = AtomicU32::new(0);
    static HITS_2: AtomicU32 = AtomicU32::new(0);

    fn counting_handler_1(_: *mut ()) {
        HITS_1.fetch_add(1, Ordering::SeqCst);
    }

    fn counting_handler_2(_: *mut ()) {
        HITS_2.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn shared_chain_dispatches_and_tears_down_on_double_free() {
        let ctl = Controller::<MockHw>::new();

        let h1 = ctl
            .alloc(Source::Peripheral(20), IrqFlags::LEVEL1 | IrqFlags::SHARED, Some(counting_handler_1), core::ptr::null_mut())
            .unwrap();
        let h2 = ctl
            .alloc(Source::Peripheral(21), IrqFlags::LEVEL1 | IrqFlags::SHARED, Some(counting_handler_2), core::ptr::null_mut())
            .unwrap();
        assert_eq!(h1.line(), h2.line(), "both shared requests land on the same line");

        HITS_1.store(0, Ordering::SeqCst);
        HITS_2.store(0, Ordering::SeqCst);
        registry::with_state(|cs, state| {
            state.entry(h1.line(), 0).dispatch(cs);
        });
        assert_eq!(HITS_1.load(Ordering::SeqCst), 1);
        assert_eq!(HITS_2.load(Ordering::SeqCst), 1);

        ctl.free(h2).unwrap();
        registry::with_state(|cs, state| {
            assert_eq!(state.entry(h1.line(), 0).subscriber_count(), 1);
            state.entry(h1.line(), 0).dispatch(cs);
        });
        assert_eq!(HITS_1.load(Ordering::SeqCst), 2);
        assert_eq!(HITS_2.load(Ordering::SeqCst), 1, "unlinked subscriber no longer fires");

        ctl.free(h1).unwrap();
        registry::with_state(|_cs, state| {
            assert_eq!(state.entry(h1.line(), 0).subscriber_count(), 0);
        });
    }
}
