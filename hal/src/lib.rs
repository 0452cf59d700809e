//! # Lattice HAL
//!
//! Machine model for a dual-core MCU whose peripheral interrupts reach
//! the CPUs through an interrupt matrix. This crate describes the parts
//! the allocator in `lattice-core` programs:
//!
//! - **[`cpu`]**: core identifiers and the current-core query
//! - **[`vectors`]**: the static per-chip vector table
//! - **[`matrix`]**: the source-to-vector crossbar
//! - **[`handlers`]**: the raw per-vector dispatch table
//! - **[`control`]**: per-core vector enable masks
//!
//! ```text
//! peripheral source ──> interrupt matrix ──> CPU vector ──> handler slot
//!                        (per core mux)      (enable bit)   (this crate)
//! ```
//!
//! All state is modeled with atomics and spin locks, so the crate runs
//! unmodified on the host for testing while keeping `no_std` semantics.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod control;
pub mod cpu;
pub mod handlers;
pub mod matrix;
pub mod vectors;

pub use control::IntrControl;
pub use cpu::{Core, CoreIdFn, CORE_COUNT};
pub use handlers::{HandlerSlot, HandlerTable, RawHandler};
pub use matrix::{InterruptMatrix, SOURCE_COUNT};
pub use vectors::{
    Trigger, VectorClass, VectorEntry, DETACH_VECTOR, NMI_LEVEL, VECTOR_COUNT, VECTOR_TABLE,
};

/// The complete interrupt hardware of the machine: matrix, dispatch
/// table, enable masks, and the current-core query.
#[derive(Debug)]
pub struct InterruptHardware {
    matrix: InterruptMatrix,
    handlers: HandlerTable,
    control: IntrControl,
    core_id: CoreIdFn,
}

impl InterruptHardware {
    /// Create hardware state with the default (boot-core-only) query.
    pub const fn new() -> Self {
        Self::with_core_id(cpu::boot_core)
    }

    /// Create hardware state with a platform-supplied core-id query.
    pub const fn with_core_id(core_id: CoreIdFn) -> Self {
        Self {
            matrix: InterruptMatrix::new(),
            handlers: HandlerTable::new(),
            control: IntrControl::new(),
            core_id,
        }
    }

    /// The core executing the caller.
    #[inline]
    pub fn current_core(&self) -> Core {
        Core::from_id((self.core_id)() % CORE_COUNT).unwrap_or(Core::Zero)
    }

    /// The source-to-vector mux.
    #[inline]
    pub fn matrix(&self) -> &InterruptMatrix {
        &self.matrix
    }

    /// The raw dispatch table.
    #[inline]
    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// The per-core enable masks.
    #[inline]
    pub fn control(&self) -> &IntrControl {
        &self.control
    }
}
