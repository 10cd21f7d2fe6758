//! The Vector Registry: array-backed runtime state for every (line, CPU)
//! pair, plus the per-line subscriber arena backing shared-mode chains.
//!
//! Replaces the classic singly-linked per-line descriptor list with a fixed
//! array: no allocator dependency, deterministic O(1) lookup. State lives
//! behind a `critical_section::Mutex<RefCell<_>>`, the same pattern used for
//! shared driver state elsewhere in this style of HAL.

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};

use crate::hardware::IrqHandler;
use crate::{NUM_CPUS, NUM_LINES};

/// Maximum number of subscribers a single shared line can hold.
///
/// Since this crate never allocates, the per-line subscriber chain is a
/// fixed-capacity arena rather than an unbounded list. Exceeding it is
/// ordinary allocation infeasibility (`Error::NotFound`), not a panic.
pub const MAX_SUBSCRIBERS_PER_LINE: usize = 8;

const SLOTS: usize = NUM_LINES * NUM_CPUS;

/// Encodes `(line, cpu)` into the registry's slot key: line in the low 5
/// bits, CPU in the bit above it.
pub(crate) const fn key(line: u8, cpu: u8) -> u8 {
    line | (cpu << 5)
}

/// Decodes a registry key back into `(line, cpu)`.
pub(crate) const fn split_key(key: u8) -> (u8, u8) {
    (key & 0x1f, key >> 5)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VectorFlags(u8);

impl VectorFlags {
    pub(crate) const RESERVED_AT_RUNTIME: Self = Self(1 << 0);
    pub(crate) const FLASH_RESIDENT: Self = Self(1 << 1);
    pub(crate) const SHARED_MODE: Self = Self(1 << 2);
    pub(crate) const EXCLUSIVE_MODE: Self = Self(1 << 3);

    const fn empty() -> Self {
        Self(0)
    }

    pub(crate) const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub(crate) fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// A single shared-line subscriber: a status-register filter plus the
/// handler it guards.
#[derive(Clone, Copy)]
struct Subscriber {
    in_use: bool,
    next: Option<u8>,
    status_reg: Option<*const u32>,
    status_mask: u32,
    handler: IrqHandler,
    arg: *mut (),
}

impl Subscriber {
    const EMPTY: Self = Self {
        in_use: false,
        next: None,
        status_reg: None,
        status_mask: 0,
        handler: noop_handler,
        arg: core::ptr::null_mut(),
    };
}

fn noop_handler(_arg: *mut ()) {}

/// One Vector Registry entry: the runtime state for a single (line, CPU).
#[derive(Clone, Copy)]
pub(crate) struct VectorEntry {
    pub(crate) flags: VectorFlags,
    head: Option<u8>,
    subscribers: [Subscriber; MAX_SUBSCRIBERS_PER_LINE],
}

impl VectorEntry {
    const EMPTY: Self = Self {
        flags: VectorFlags::empty(),
        head: None,
        subscribers: [Subscriber::EMPTY; MAX_SUBSCRIBERS_PER_LINE],
    };

    /// Number of subscribers currently chained onto this entry.
    pub(crate) fn subscriber_count(&self) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while let Some(slot) = cur {
            n += 1;
            cur = self.subscribers[slot as usize].next;
        }
        n
    }

    /// Pushes a new subscriber onto the head of the chain. Returns the slot
    /// index on success, `None` if the arena is full.
    pub(crate) fn push_subscriber(
        &mut self,
        status_reg: Option<*const u32>,
        status_mask: u32,
        handler: IrqHandler,
        arg: *mut (),
    ) -> Option<u8> {
        let slot = self.subscribers.iter().position(|s| !s.in_use)? as u8;
        self.subscribers[slot as usize] = Subscriber {
            in_use: true,
            next: self.head,
            status_reg,
            status_mask,
            handler,
            arg,
        };
        self.head = Some(slot);
        Some(slot)
    }

    /// Unlinks `slot` from the chain and returns it to the free arena.
    /// Returns `true` if the chain is now empty.
    pub(crate) fn remove_subscriber(&mut self, slot: u8) -> bool {
        let mut prev: Option<u8> = None;
        let mut cur = self.head;
        while let Some(idx) = cur {
            if idx == slot {
                let next = self.subscribers[idx as usize].next;
                match prev {
                    Some(p) => self.subscribers[p as usize].next = next,
                    None => self.head = next,
                }
                self.subscribers[idx as usize] = Subscriber::EMPTY;
                break;
            }
            prev = Some(idx);
            cur = self.subscribers[idx as usize].next;
        }
        self.head.is_none()
    }

    /// Invokes `handler(arg)` for every subscriber whose status register is
    /// null or whose masked read is non-zero, in push-front (most recently
    /// added first) order. Must only be called from inside the global
    /// critical section (enforced by requiring a `CriticalSection` token).
    pub(crate) fn dispatch(&self, _cs: CriticalSection) {
        let mut cur = self.head;
        while let Some(slot) = cur {
            let sub = &self.subscribers[slot as usize];
            let fires = match sub.status_reg {
                None => true,
                // SAFETY: `status_reg` is a platform-supplied peripheral
                // status address, valid for the lifetime of the
                // subscription; the caller of `alloc_with_status` is
                // responsible for that contract.
                Some(reg) => unsafe { core::ptr::read_volatile(reg) & sub.status_mask != 0 },
            };
            if fires {
                (sub.handler)(sub.arg);
            }
            cur = sub.next;
        }
    }
}

pub(crate) struct GlobalState {
    pub(crate) registry: [VectorEntry; SLOTS],
    pub(crate) non_iram: [u32; NUM_CPUS],
    pub(crate) window_active: [bool; NUM_CPUS],
    pub(crate) saved_mask: [u32; NUM_CPUS],
}

// Raw pointers inside `Subscriber` make this !Send/!Sync by default, but
// every access goes through the single `critical_section::Mutex` below.
unsafe impl Send for GlobalState {}

impl GlobalState {
    pub(crate) const fn new() -> Self {
        Self {
            registry: [VectorEntry::EMPTY; SLOTS],
            non_iram: [0; NUM_CPUS],
            window_active: [false; NUM_CPUS],
            saved_mask: [0; NUM_CPUS],
        }
    }

    /// Every `(line, cpu)` pair has a permanent slot, so lookup never fails
    /// and there is no separate "create" step.
    pub(crate) fn entry(&self, line: u8, cpu: u8) -> &VectorEntry {
        &self.registry[key(line, cpu) as usize]
    }

    pub(crate) fn entry_mut(&mut self, line: u8, cpu: u8) -> &mut VectorEntry {
        &mut self.registry[key(line, cpu) as usize]
    }
}

static STATE: Mutex<RefCell<GlobalState>> = Mutex::new(RefCell::new(GlobalState::new()));

/// Runs `f` with exclusive access to the global registry/window state,
/// under the crate's single global critical section.
pub(crate) fn with_state<R>(f: impl FnOnce(CriticalSection, &mut GlobalState) -> R) -> R {
    critical_section::with(|cs| {
        let cell = STATE.borrow(cs);
        let mut state = cell.borrow_mut();
        f(cs, &mut state)
    })
}

/// An opaque handle to an allocated interrupt line.
///
/// `Copy`, not heap-allocated: it names a registry slot (and, for a shared
/// subscription, a slot in that line's subscriber arena) by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle {
    pub(crate) key: u8,
    pub(crate) subscriber_slot: Option<u8>,
}

impl Handle {
    pub(crate) fn line(&self) -> u8 {
        split_key(self.key).0
    }

    pub(crate) fn cpu(&self) -> u8 {
        split_key(self.key).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(handler: IrqHandler) -> (Option<*const u32>, u32, IrqHandler, *mut ()) {
        (None, 0, handler, core::ptr::null_mut())
    }

    fn handler_a(_: *mut ()) {}
    fn handler_b(_: *mut ()) {}

    #[test]
    fn key_roundtrips() {
        for line in 0u8..32 {
            for cpu in 0u8..2 {
                let k = key(line, cpu);
                assert_eq!(split_key(k), (line, cpu));
            }
        }
    }

    #[test]
    fn push_is_most_recent_first() {
        let mut e = VectorEntry::EMPTY;
        let (r, m, _, a) = h(handler_a);
        let s1 = e.push_subscriber(r, m, handler_a, a).unwrap();
        let s2 = e.push_subscriber(r, m, handler_b, a).unwrap();
        assert_eq!(e.head, Some(s2));
        assert_eq!(e.subscribers[s2 as usize].next, Some(s1));
        assert_eq!(e.subscriber_count(), 2);
    }

    #[test]
    fn arena_exhaustion_returns_none() {
        let mut e = VectorEntry::EMPTY;
        let (r, m, _, a) = h(handler_a);
        for _ in 0..MAX_SUBSCRIBERS_PER_LINE {
            assert!(e.push_subscriber(r, m, handler_a, a).is_some());
        }
        assert!(e.push_subscriber(r, m, handler_a, a).is_none());
    }

    #[test]
    fn removing_only_subscriber_empties_chain() {
        let mut e = VectorEntry::EMPTY;
        let (r, m, _, a) = h(handler_a);
        let s1 = e.push_subscriber(r, m, handler_a, a).unwrap();
        let now_empty = e.remove_subscriber(s1);
        assert!(now_empty);
        assert_eq!(e.subscriber_count(), 0);
    }

    #[test]
    fn removing_middle_subscriber_keeps_others() {
        let mut e = VectorEntry::EMPTY;
        let (r, m, _, a) = h(handler_a);
        let s1 = e.push_subscriber(r, m, handler_a, a).unwrap();
        let s2 = e.push_subscriber(r, m, handler_a, a).unwrap();
        let s3 = e.push_subscriber(r, m, handler_a, a).unwrap();
        let emptied = e.remove_subscriber(s2);
        assert!(!emptied);
        assert_eq!(e.subscriber_count(), 2);
        assert_eq!(e.subscribers[s3 as usize].next, Some(s1));
    }
}
