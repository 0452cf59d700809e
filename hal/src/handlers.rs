//! # Raw Vector Handler Table
//!
//! The direct per-vector dispatch table: for every core and vector, one
//! `(handler, argument)` slot invoked when that vector fires. Slots
//! start out bound to an "unhandled" sentinel; anything above this layer
//! (the allocator, or code seizing a vector directly) binds real
//! handlers and is expected to restore the sentinel when done.
//!
//! The table also keeps a per-vector hit counter for diagnostics.

use core::sync::atomic::{AtomicU64, Ordering};

use spin::RwLock;

use crate::cpu::{Core, CORE_COUNT};
use crate::vectors::VECTOR_COUNT;

/// A raw vector handler.
pub type RawHandler = fn(*mut ());

/// One dispatch slot: handler plus its opaque argument.
#[derive(Clone, Copy)]
pub struct HandlerSlot {
    handler: RawHandler,
    arg: *mut (),
}

// SAFETY: the argument pointer is opaque to the table; it is only ever
// passed back to the handler it was bound with.
unsafe impl Send for HandlerSlot {}
unsafe impl Sync for HandlerSlot {}

fn unhandled_interrupt(_arg: *mut ()) {
    panic!("unhandled interrupt");
}

impl HandlerSlot {
    const fn unbound() -> Self {
        Self {
            handler: unhandled_interrupt,
            arg: core::ptr::null_mut(),
        }
    }

    /// The bound handler.
    #[inline]
    pub fn handler(&self) -> RawHandler {
        self.handler
    }

    /// The bound argument.
    #[inline]
    pub fn arg(&self) -> *mut () {
        self.arg
    }

    /// Whether a real handler (not the sentinel) is bound.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.handler as usize != unhandled_interrupt as usize
    }
}

impl core::fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerSlot")
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// The per-core dispatch table.
pub struct HandlerTable {
    slots: RwLock<[[HandlerSlot; VECTOR_COUNT]; CORE_COUNT]>,
    hits: [[AtomicU64; VECTOR_COUNT]; CORE_COUNT],
}

impl HandlerTable {
    /// Create a table with every slot unbound.
    pub const fn new() -> Self {
        const SLOT: HandlerSlot = HandlerSlot::unbound();
        const SLOT_ROW: [HandlerSlot; VECTOR_COUNT] = [SLOT; VECTOR_COUNT];
        const HIT: AtomicU64 = AtomicU64::new(0);
        const HIT_ROW: [AtomicU64; VECTOR_COUNT] = [HIT; VECTOR_COUNT];
        Self {
            slots: RwLock::new([SLOT_ROW; CORE_COUNT]),
            hits: [HIT_ROW; CORE_COUNT],
        }
    }

    /// Bind `handler` with `arg` to `vector` on `core`.
    ///
    /// # Safety
    ///
    /// `arg` must remain valid for as long as the binding is in place.
    pub unsafe fn bind(&self, core: Core, vector: u8, handler: RawHandler, arg: *mut ()) {
        self.slots.write()[core.id()][vector as usize] = HandlerSlot { handler, arg };
    }

    /// Restore the unhandled sentinel on `vector`.
    pub fn unbind(&self, core: Core, vector: u8) {
        self.slots.write()[core.id()][vector as usize] = HandlerSlot::unbound();
    }

    /// Current slot for `vector` on `core`.
    #[inline]
    pub fn get(&self, core: Core, vector: u8) -> HandlerSlot {
        self.slots.read()[core.id()][vector as usize]
    }

    /// Whether `vector` on `core` has a real handler bound.
    #[inline]
    pub fn is_bound(&self, core: Core, vector: u8) -> bool {
        self.get(core, vector).is_bound()
    }

    /// Times `vector` has fired on `core`.
    #[inline]
    pub fn hits(&self, core: Core, vector: u8) -> u64 {
        self.hits[core.id()][vector as usize].load(Ordering::Relaxed)
    }

    /// Fire `vector` on `core`: the CPU-side dispatch entry.
    ///
    /// The platform's low-level vector stubs call this; hosted tests call
    /// it to simulate the hardware.
    ///
    /// # Safety
    ///
    /// The slot's argument must still be valid (see [`HandlerTable::bind`]).
    ///
    /// # Panics
    ///
    /// Panics if the slot is unbound.
    pub unsafe fn invoke(&self, core: Core, vector: u8) {
        let slot = self.get(core, vector);
        if !slot.is_bound() {
            panic!("unhandled interrupt: core {} vector {}", core.id(), vector);
        }
        self.hits[core.id()][vector as usize].fetch_add(1, Ordering::Relaxed);
        (slot.handler)(slot.arg);
    }
}

impl core::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerTable").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
