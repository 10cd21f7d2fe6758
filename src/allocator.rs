//! The Allocator: `choose_line`, the constraint-satisfaction search over the
//! Line Catalog and Vector Registry.
//!
//! A non-forced request never considers a `special` line, and a shared
//! request against an already-shared line that has no free subscriber slot
//! is skipped rather than silently treated as a match.

use crate::catalog::{self, LineClass, Trigger};
use crate::flags::IrqFlags;
use crate::hardware::Hardware;
use crate::registry::{GlobalState, MAX_SUBSCRIBERS_PER_LINE};
use crate::registry::VectorFlags;
use crate::NUM_LINES;

/// The highest line index considered by the search; line 31 is excluded.
const SEARCH_LIMIT: u8 = 31;

#[derive(Clone, Copy)]
struct Candidate {
    line: u8,
    /// Lower is better. For shared candidates this is `(subscriber_count,
    /// priority)` packed into one comparable key; for exclusive candidates
    /// (and shared-fallback candidates) it's `(u16::MAX, priority)` so any
    /// already-shared candidate always wins a shared request.
    score: (u16, u8),
}

/// Selects a line satisfying `flags` for `cpu`, honoring `force` if set.
/// Returns `None` if no line qualifies.
pub(crate) fn choose_line<H: Hardware>(state: &GlobalState, mut flags: IrqFlags, cpu: u8, force: Option<u8>) -> Option<u8> {
    if !flags.has_level() {
        flags |= if flags.contains(IrqFlags::SHARED) {
            IrqFlags::LEVEL1
        } else {
            IrqFlags::LOWMED
        };
    }

    let mut best: Option<Candidate> = None;
    // Fallback candidate for a shared request that hasn't found any
    // already-shared line yet; only used if no already-shared candidate
    // is ever found.
    let mut shared_fallback: Option<Candidate> = None;

    for x in 0..SEARCH_LIMIT {
        if let Some(f) = force {
            if f != x {
                continue;
            }
        }

        let catalog_entry = catalog::entry(x);
        let class = catalog_entry.class[cpu as usize];

        if class == LineClass::ReservedByDesign {
            continue;
        }
        if force.is_none() && class == LineClass::Special {
            // A non-forced caller never picks a fixed-function line.
            continue;
        }
        if !flags.allows_priority(catalog_entry.priority) {
            continue;
        }
        let edge_requested = flags.contains(IrqFlags::EDGE);
        match catalog_entry.trigger {
            Trigger::Level if edge_requested => continue,
            Trigger::Edge if !edge_requested => continue,
            _ => {}
        }

        let vd = state.entry(x, cpu);
        if H::has_custom_vector(x, cpu) && !vd.flags.contains(VectorFlags::SHARED_MODE) {
            continue;
        }
        debug_assert!(!(vd.flags.contains(VectorFlags::SHARED_MODE) && vd.flags.contains(VectorFlags::EXCLUSIVE_MODE)));
        if vd.flags.contains(VectorFlags::RESERVED_AT_RUNTIME) {
            continue;
        }
        if vd.flags.contains(VectorFlags::EXCLUSIVE_MODE) {
            continue;
        }

        if flags.contains(IrqFlags::SHARED) {
            let want_iram = flags.contains(IrqFlags::IRAM);
            let is_shared = vd.flags.contains(VectorFlags::SHARED_MODE);
            if is_shared {
                let has_iram = vd.flags.contains(VectorFlags::FLASH_RESIDENT);
                if has_iram != want_iram {
                    continue;
                }
                let n = vd.subscriber_count();
                if n >= MAX_SUBSCRIBERS_PER_LINE {
                    continue;
                }
                let score = (n as u16, catalog_entry.priority);
                if best.is_none() || score < best.unwrap().score {
                    best = Some(Candidate { line: x, score });
                }
            } else if best.is_none() {
                let score = (u16::MAX, catalog_entry.priority);
                if shared_fallback.is_none() || score < shared_fallback.unwrap().score {
                    shared_fallback = Some(Candidate { line: x, score });
                }
            }
        } else {
            if vd.flags.contains(VectorFlags::SHARED_MODE) {
                continue;
            }
            let score = (u16::MAX, catalog_entry.priority);
            if best.is_none() || score < best.unwrap().score {
                best = Some(Candidate { line: x, score });
            }
        }
    }

    best.or(shared_fallback).map(|c| c.line)
}

static_assertions::const_assert!(NUM_LINES as u8 > SEARCH_LIMIT);

#[cfg(test)]
mod tests {
    use super::*;

    struct MockHw;
    impl Hardware for MockHw {
        fn current_cpu() -> u8 {
            0
        }
        unsafe fn install_vector(_line: u8, _handler: Option<crate::hardware::IrqHandler>, _arg: *mut ()) {}
        fn has_custom_vector(_line: u8, _cpu: u8) -> bool {
            false
        }
        fn enable_line(_line: u8) {}
        fn disable_line(_line: u8) {}
        fn clear_pending(_line: u8) {}
        fn route(_cpu: u8, _source: u32, _line: u8) {}
        fn read_enable_mask(_cpu: u8) -> u32 {
            0
        }
        fn write_enable_mask(_cpu: u8, _mask: u32) {}
    }

    fn fresh() -> GlobalState {
        GlobalState::new()
    }

    #[test]
    fn exclusive_lowmed_prefers_lowest_priority_line() {
        let state = fresh();
        let line = choose_line::<MockHw>(&state, IrqFlags::empty(), 0, None).unwrap();
        // Priority-1 normal lines on cpu0 include line 9, which is the
        // lowest-numbered one; scoring only compares priority, and ties
        // break on first-seen (ascending index) because `<` is strict.
        assert_eq!(catalog::entry(line).priority, 1);
        assert_eq!(line, 9);
    }

    #[test]
    fn forced_special_line_is_reachable() {
        let state = fresh();
        let line = choose_line::<MockHw>(&state, IrqFlags::LEVEL3, 0, Some(15)).unwrap();
        assert_eq!(line, 15);
    }

    #[test]
    fn special_line_unreachable_without_force() {
        let state = fresh();
        // Line 11 (profiling) is priority 3, Na trigger, Special class. A
        // caller asking for level3 without forcing must never receive it.
        let line = choose_line::<MockHw>(&state, IrqFlags::LEVEL3, 0, None);
        assert_ne!(line, Some(11));
    }

    #[test]
    fn reserved_by_design_never_returned() {
        let state = fresh();
        for mask in [IrqFlags::LEVEL1, IrqFlags::LEVEL3, IrqFlags::LEVEL7] {
            let mut cpu = 0u8;
            while cpu < 2 {
                if let Some(line) = choose_line::<MockHw>(&state, mask, cpu, None) {
                    assert_ne!(catalog::entry(line).class[cpu as usize], LineClass::ReservedByDesign);
                }
                cpu += 1;
            }
        }
    }

    #[test]
    fn shared_request_prefers_already_shared_line_over_new_one() {
        let mut state = fresh();
        // Manually mark line 9 as shared with one subscriber so it competes
        // against fresh lines for a new shared request.
        {
            let e = state.entry_mut(9, 0);
            e.flags.insert(VectorFlags::SHARED_MODE);
            e.push_subscriber(None, 0, noop, core::ptr::null_mut());
        }
        let line = choose_line::<MockHw>(&state, IrqFlags::SHARED, 0, None).unwrap();
        assert_eq!(line, 9);
    }

    fn noop(_: *mut ()) {}
}
