//! # Lattice Core
//!
//! Runtime interrupt vector allocator for dual-core interrupt-matrix
//! MCUs. Peripherals raise named interrupt sources; each core owns a
//! small, fixed set of vectors with silicon-fixed priority and trigger
//! type. This crate assigns vectors to sources at runtime:
//!
//! - exclusive or shared vectors (a shared vector fans out through a
//!   trampoline to a chain of registrations, optionally filtered by a
//!   status register),
//! - capability-driven search (priority band, edge/level trigger,
//!   fast-memory residency),
//! - runtime reservation for init-time carve-outs,
//! - enable/disable gating that works per registration, and
//! - fast-memory-only windows for cache-disabled code paths.
//!
//! Every decide-and-commit sequence runs under one cross-core critical
//! section, keeping the in-memory descriptors, the interrupt-matrix
//! mux, and the CPU enable masks consistent at all times.
//!
//! The machine itself (vector table, matrix, dispatch slots) lives in
//! [`lattice_hal`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use lattice_core::{allocator, periph, AllocFlags};
//!
//! fn uart_isr(arg: *mut ()) { /* ... */ }
//!
//! let handle = unsafe {
//!     allocator().alloc(
//!         periph::UART0,
//!         AllocFlags::LEVEL1 | AllocFlags::LEVEL2,
//!         Some(uart_isr),
//!         core::ptr::null_mut(),
//!     )
//! }?;
//! // ... later:
//! allocator().free(handle)?;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod allocator;
pub mod diag;
pub mod error;
pub mod flags;
pub mod source;

mod desc;
mod dispatch;

pub use allocator::{allocator, InterruptAllocator, IntrHandle};
pub use desc::StatusCheck;
pub use diag::{Usage, VectorInfo};
pub use error::{IntrError, IntrResult};
pub use flags::AllocFlags;
pub use source::{periph, InternalSource, Source};

/// Handler signature accepted by the allocator.
pub type IsrHandler = lattice_hal::RawHandler;
