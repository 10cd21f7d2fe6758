//! The Line Catalog: a static, read-only table of what each of the 32
//! hardware interrupt lines is good for.
//!
//! The per-CPU core-timer reservation is expressed as a trio of
//! mutually-exclusive crate features, mirroring the
//! `CONFIG_FREERTOS_CORETIMER_N` Kconfig choice this table was adapted from.

use crate::NUM_CPUS;

#[cfg(all(feature = "coretimer0", feature = "coretimer1"))]
compile_error!("at most one of the `coretimer0`/`coretimer1`/`coretimer2` features may be enabled");
#[cfg(all(feature = "coretimer0", feature = "coretimer2"))]
compile_error!("at most one of the `coretimer0`/`coretimer1`/`coretimer2` features may be enabled");
#[cfg(all(feature = "coretimer1", feature = "coretimer2"))]
compile_error!("at most one of the `coretimer0`/`coretimer1`/`coretimer2` features may be enabled");
#[cfg(not(any(feature = "coretimer0", feature = "coretimer1", feature = "coretimer2")))]
compile_error!("exactly one of the `coretimer0`/`coretimer1`/`coretimer2` features must be enabled");

/// The hardware line reserved for the kernel's own core-timer tick, as
/// selected by the `coretimerN` crate feature.
#[cfg(feature = "coretimer0")]
const KERNEL_CORE_TIMER_LINE: u8 = 6;
#[cfg(feature = "coretimer1")]
const KERNEL_CORE_TIMER_LINE: u8 = 15;
#[cfg(feature = "coretimer2")]
const KERNEL_CORE_TIMER_LINE: u8 = 16;

/// The three candidate core-timer lines; exactly one is `ReservedByDesign`
/// (see [`KERNEL_CORE_TIMER_LINE`]), the other two are `Special`.
const CORE_TIMER_LINES: [u8; 3] = [6, 15, 16];

/// Per-(line,CPU) reservation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineClass {
    /// Freely allocatable by [`crate::allocator::choose_line`].
    Normal,
    /// Owned by the chip or kernel; never returned by the allocator.
    ReservedByDesign,
    /// A fixed-function line, only reachable when a caller's source
    /// identity forces exactly this line.
    Special,
}

/// Edge/level trigger compatibility of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trigger {
    /// Level-triggered.
    Level,
    /// Edge-triggered.
    Edge,
    /// Timer/software lines that don't participate in edge/level selection.
    NotApplicable,
}

/// One row of the Line Catalog.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CatalogEntry {
    /// Interrupt priority, `1..=7` (`7` is non-maskable).
    pub priority: u8,
    /// Edge/level trigger compatibility.
    pub trigger: Trigger,
    /// Reservation class per CPU.
    pub class: [LineClass; NUM_CPUS],
}

const fn core_timer_class(line: u8) -> LineClass {
    if line == KERNEL_CORE_TIMER_LINE {
        LineClass::ReservedByDesign
    } else {
        LineClass::Special
    }
}

const fn row(priority: u8, trigger: Trigger, cpu0: LineClass, cpu1: LineClass) -> CatalogEntry {
    CatalogEntry {
        priority,
        trigger,
        class: [cpu0, cpu1],
    }
}

const fn uniform(priority: u8, trigger: Trigger, class: LineClass) -> CatalogEntry {
    row(priority, trigger, class, class)
}

use LineClass::{Normal, ReservedByDesign as Resvd, Special};
use Trigger::{Edge, Level, NotApplicable as Na};

/// The static 32-entry Line Catalog, one row per hardware line index.
///
/// Line 14 is the NMI (priority 7, reserved on both CPUs). Lines 6/15/16
/// are the three core-timer candidates.
pub static LINE_CATALOG: [CatalogEntry; 32] = [
    uniform(1, Level, Resvd),               // 0
    uniform(1, Level, Resvd),               // 1
    uniform(1, Level, Resvd),               // 2
    uniform(1, Level, Resvd),               // 3
    row(1, Level, Resvd, Normal),           // 4
    row(1, Level, Resvd, Normal),           // 5
    uniform(1, Na, core_timer_class(6)),    // 6  (core timer 0 candidate)
    uniform(1, Na, Special),                // 7  (software trigger 0)
    uniform(1, Level, Resvd),               // 8
    uniform(1, Level, Normal),              // 9
    row(1, Edge, Resvd, Normal),            // 10
    uniform(3, Na, Special),                // 11 (profiling)
    uniform(1, Level, Normal),              // 12
    uniform(1, Level, Normal),              // 13
    uniform(7, Level, Resvd),               // 14 (NMI)
    uniform(3, Na, core_timer_class(15)),   // 15 (core timer 1 candidate)
    uniform(5, Na, core_timer_class(16)),   // 16 (core timer 2 candidate)
    uniform(1, Level, Normal),              // 17
    uniform(1, Level, Normal),              // 18
    uniform(2, Level, Normal),              // 19
    uniform(2, Level, Normal),              // 20
    uniform(2, Level, Normal),              // 21
    row(3, Edge, Resvd, Normal),            // 22
    uniform(3, Level, Normal),              // 23
    row(4, Level, Resvd, Normal),           // 24
    uniform(4, Level, Resvd),               // 25
    uniform(5, Level, Resvd),               // 26
    uniform(3, Level, Resvd),               // 27
    uniform(4, Edge, Normal),               // 28
    uniform(3, Na, Special),                // 29 (software trigger 1)
    uniform(4, Edge, Resvd),                // 30
    uniform(5, Level, Resvd),               // 31
];

/// Look up the catalog row for a hardware line (`0..32`).
///
/// # Panics
///
/// Panics if `line >= 32`; callers validate line indices before reaching
/// the catalog.
pub fn entry(line: u8) -> &'static CatalogEntry {
    &LINE_CATALOG[line as usize]
}

/// Returns the hardware line a given internal source forces, or `None` if
/// the source imposes no force.
///
/// Core timers 0/1/2, software triggers 0/1, and profiling each pin
/// exactly one line.
pub fn forced_line(source: InternalSource) -> Option<u8> {
    match source {
        InternalSource::CoreTimer0 => Some(6),
        InternalSource::CoreTimer1 => Some(15),
        InternalSource::CoreTimer2 => Some(16),
        InternalSource::SoftwareTrigger0 => Some(7),
        InternalSource::SoftwareTrigger1 => Some(29),
        InternalSource::Profiling => Some(11),
        InternalSource::None => None,
    }
}

/// Identity of an interrupt source, insofar as the allocator cares: either
/// one of the fixed internal sources that forces a specific line, or an
/// ordinary peripheral source that imposes no constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InternalSource {
    CoreTimer0,
    CoreTimer1,
    CoreTimer2,
    SoftwareTrigger0,
    SoftwareTrigger1,
    Profiling,
    /// Any other peripheral source; imposes no force.
    None,
}
