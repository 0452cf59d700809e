//! # Interrupt Matrix
//!
//! Register model of the source-to-vector crossbar. Every peripheral
//! interrupt source has one mux slot per core holding the vector number
//! it currently drives; routing a source to [`DETACH_VECTOR`] gates it,
//! since matrix lines to fixed vectors are not wired.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Interrupt Matrix                     │
//! ├──────────────────────────────────────────────────────┤
//! │          source 0   source 1   ...   source N-1      │
//! │  core 0  [vec/park] [vec/park] ...   [vec/park]      │
//! │  core 1  [vec/park] [vec/park] ...   [vec/park]      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The slots are modeled as atomics so the structure is freely shared;
//! callers serialize route/detach decisions externally, exactly as the
//! real mux registers are written under the allocator's critical
//! section.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::cpu::{Core, CORE_COUNT};
use crate::vectors::DETACH_VECTOR;

/// Number of peripheral interrupt source lines per core.
pub const SOURCE_COUNT: usize = 64;

/// The source-to-vector mux, one slot per core and source.
pub struct InterruptMatrix {
    map: [[AtomicU8; SOURCE_COUNT]; CORE_COUNT],
}

impl InterruptMatrix {
    /// Create a matrix with every source parked.
    pub const fn new() -> Self {
        const SLOT: AtomicU8 = AtomicU8::new(DETACH_VECTOR);
        const ROW: [AtomicU8; SOURCE_COUNT] = [SLOT; SOURCE_COUNT];
        Self {
            map: [ROW; CORE_COUNT],
        }
    }

    /// Route `source` to `vector` on `core`.
    pub fn route(&self, core: Core, source: u8, vector: u8) {
        self.map[core.id()][source as usize].store(vector, Ordering::Release);
        log::trace!(
            "matrix: core {} source {} -> vector {}",
            core.id(),
            source,
            vector
        );
    }

    /// Park `source` on the detach slot, gating it.
    pub fn detach(&self, core: Core, source: u8) {
        self.route(core, source, DETACH_VECTOR);
    }

    /// Vector currently driven by `source` on `core`.
    #[inline]
    pub fn mapping(&self, core: Core, source: u8) -> u8 {
        self.map[core.id()][source as usize].load(Ordering::Acquire)
    }

    /// Whether `source` is currently parked on `core`.
    #[inline]
    pub fn is_detached(&self, core: Core, source: u8) -> bool {
        self.mapping(core, source) == DETACH_VECTOR
    }
}

impl core::fmt::Debug for InterruptMatrix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InterruptMatrix").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
