#![cfg_attr(not(test), no_std)]

//! Interrupt allocation core for a dual-core Xtensa-class microcontroller.
//!
//! This crate multiplexes a fixed set of hardware interrupt lines (32 per
//! CPU, 2 CPUs) among an open-ended set of peripheral interrupt sources. It
//! owns:
//!
//! - a static [`catalog`] of which lines exist and what they're good for,
//! - an array-backed [`registry`] of runtime allocation state,
//! - the [`allocator`] that picks a line for a request,
//! - the [`dispatcher`] that fans a shared line out to its subscribers,
//! - the [`window`] that masks non-flash-resident lines during flash access,
//!
//! and exposes all of it through [`Controller`], generic over a
//! [`Hardware`] implementation supplied by the platform integration layer.
//!
//! The crate never touches `INTENABLE`, the vector table, or the routing
//! matrix directly -- those are the [`Hardware`] trait's job. This keeps the
//! allocation logic itself host-testable (see the `tests` submodules).

mod allocator;
mod catalog;
mod controller;
mod dispatcher;
mod error;
mod flags;
mod hardware;
mod registry;
mod window;

pub use catalog::InternalSource;
pub use controller::{Controller, Source};
pub use error::{Error, Result};
pub use flags::IrqFlags;
pub use hardware::{Hardware, IrqHandler};
pub use registry::{Handle, MAX_SUBSCRIBERS_PER_LINE};

/// Number of CPUs sharing the interrupt allocation core.
pub const NUM_CPUS: usize = 2;

/// Number of hardware interrupt lines per CPU.
pub const NUM_LINES: usize = 32;

static_assertions::const_assert_eq!(NUM_LINES, 32);
static_assertions::const_assert!(NUM_CPUS >= 1);
