//! # Interrupt Vector Table
//!
//! Build-time description of the CPU interrupt vectors. Each core owns
//! `VECTOR_COUNT` numbered vectors; a vector's priority level and trigger
//! type are fixed in silicon, and each core may additionally mark a
//! vector reserved or special.
//!
//! ## Vector Layout
//!
//! ```text
//! Vec  Level  Trigger  Core0/Core1   Notes
//! ───────────────────────────────────────────────────────────
//!  0   1      Level    Rsvd/Rsvd     exception dispatch scratch
//!  1   1      Level    Rsvd/Rsvd
//!  2   1      Level    Norm/Norm
//!  ...
//!  6   1      Fixed    Spec/Spec     core timer 0 (OS tick)
//!  7   1      Fixed    Spec/Spec     software interrupt 0
//! 11   3      Fixed    Spec/Spec     profiling
//! 14   7      Level    Rsvd/Rsvd     NMI
//! 15   3      Fixed    Rsvd/Rsvd     scheduler timer; mux park slot
//! 16   5      Fixed    Spec/Spec     core timer 2
//! 29   3      Fixed    Spec/Spec     software interrupt 1
//! 31   5      Level    Rsvd/Rsvd
//! ───────────────────────────────────────────────────────────
//! ```
//!
//! `Fixed` vectors are hard-wired to CPU-internal mechanisms; the matrix
//! lines leading to them are not connected, which is what makes
//! [`DETACH_VECTOR`] usable as a parking slot for gated sources.

use static_assertions::const_assert;

use crate::cpu::{Core, CORE_COUNT};

// =============================================================================
// Constants
// =============================================================================

/// Number of interrupt vectors per core.
pub const VECTOR_COUNT: usize = 32;

/// Priority level of the non-maskable interrupt vector.
pub const NMI_LEVEL: u8 = 7;

/// Vector used to park detached interrupt-matrix entries.
///
/// A `Fixed` vector reserved on both cores: a source routed here is
/// effectively disconnected, because matrix lines to fixed vectors are
/// not wired.
pub const DETACH_VECTOR: u8 = 15;

// Vector numbers must fit the per-core 32-bit enable mask.
const_assert!(VECTOR_COUNT <= 32);

// =============================================================================
// Entry Types
// =============================================================================

/// Trigger type of a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Level-triggered external vector.
    Level,
    /// Edge-triggered external vector.
    Edge,
    /// Hard-wired to a CPU-internal mechanism (timer, software, profiling).
    Fixed,
}

/// Per-core usability class of a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorClass {
    /// Freely allocatable.
    Normal,
    /// Never allocatable on this core.
    Reserved,
    /// Allocatable only when a caller forces this exact vector.
    Special,
}

/// One row of the static vector table.
#[derive(Debug, Clone, Copy)]
pub struct VectorEntry {
    /// Hardware-fixed priority level, 1..=7.
    pub level: u8,
    /// Trigger type.
    pub trigger: Trigger,
    /// Usability class per core.
    pub class: [VectorClass; CORE_COUNT],
}

impl VectorEntry {
    const fn new(level: u8, trigger: Trigger, class: [VectorClass; CORE_COUNT]) -> Self {
        Self {
            level,
            trigger,
            class,
        }
    }

    /// Usability class of this vector on `core`.
    #[inline]
    pub const fn class_on(&self, core: Core) -> VectorClass {
        self.class[core.id()]
    }

    /// Whether this vector is reserved in hardware on `core`.
    #[inline]
    pub fn is_reserved_on(&self, core: Core) -> bool {
        matches!(self.class_on(core), VectorClass::Reserved)
    }
}

// =============================================================================
// The Table
// =============================================================================

use self::Trigger::{Edge, Fixed, Level};
use self::VectorClass::{Normal as N, Reserved as R, Special as S};

/// The static per-chip vector table.
pub static VECTOR_TABLE: [VectorEntry; VECTOR_COUNT] = [
    VectorEntry::new(1, Level, [R, R]), // 0: exception dispatch scratch
    VectorEntry::new(1, Level, [R, R]), // 1
    VectorEntry::new(1, Level, [N, N]), // 2
    VectorEntry::new(1, Level, [N, N]), // 3
    VectorEntry::new(1, Level, [R, N]), // 4
    VectorEntry::new(1, Level, [N, N]), // 5
    VectorEntry::new(1, Fixed, [S, S]), // 6: core timer 0 (OS tick)
    VectorEntry::new(1, Fixed, [S, S]), // 7: software interrupt 0
    VectorEntry::new(1, Level, [R, R]), // 8
    VectorEntry::new(1, Level, [N, N]), // 9
    VectorEntry::new(1, Edge, [N, N]),  // 10
    VectorEntry::new(3, Fixed, [S, S]), // 11: profiling
    VectorEntry::new(1, Level, [N, N]), // 12
    VectorEntry::new(1, Level, [N, N]), // 13
    VectorEntry::new(7, Level, [R, R]), // 14: NMI
    VectorEntry::new(3, Fixed, [R, R]), // 15: scheduler timer; park slot
    VectorEntry::new(5, Fixed, [S, S]), // 16: core timer 2
    VectorEntry::new(1, Level, [N, N]), // 17
    VectorEntry::new(1, Level, [N, N]), // 18
    VectorEntry::new(2, Level, [N, N]), // 19
    VectorEntry::new(2, Level, [N, N]), // 20
    VectorEntry::new(2, Level, [N, N]), // 21
    VectorEntry::new(3, Edge, [N, N]),  // 22
    VectorEntry::new(3, Level, [N, N]), // 23
    VectorEntry::new(4, Level, [R, N]), // 24
    VectorEntry::new(4, Level, [R, R]), // 25
    VectorEntry::new(5, Level, [R, R]), // 26
    VectorEntry::new(3, Level, [N, N]), // 27
    VectorEntry::new(4, Edge, [N, N]),  // 28
    VectorEntry::new(3, Fixed, [S, S]), // 29: software interrupt 1
    VectorEntry::new(4, Edge, [R, R]),  // 30
    VectorEntry::new(5, Level, [R, R]), // 31
];

/// Look up the table entry for a vector number.
///
/// # Panics
///
/// Panics if `vector >= VECTOR_COUNT`.
#[inline]
pub fn entry(vector: u8) -> VectorEntry {
    VECTOR_TABLE[vector as usize]
}

const _: () = assert!((DETACH_VECTOR as usize) < VECTOR_COUNT);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_in_range() {
        for e in &VECTOR_TABLE {
            assert!(e.level >= 1 && e.level <= NMI_LEVEL);
        }
    }

    #[test]
    fn test_fixed_vectors_never_normal() {
        for e in &VECTOR_TABLE {
            if matches!(e.trigger, Trigger::Fixed) {
                for c in &e.class {
                    assert!(!matches!(c, VectorClass::Normal));
                }
            }
        }
    }

    #[test]
    fn test_both_cores_have_free_low_level_vectors() {
        for core in [Core::Zero, Core::One] {
            let free = VECTOR_TABLE
                .iter()
                .filter(|e| e.level <= 3 && matches!(e.class_on(core), VectorClass::Normal))
                .count();
            assert!(free >= 8, "core {} has only {} usable vectors", core.id(), free);
        }
    }

    #[test]
    fn test_edge_vectors_exist() {
        assert!(VECTOR_TABLE
            .iter()
            .any(|e| matches!(e.trigger, Trigger::Edge)));
    }

    #[test]
    fn test_park_slot_reserved() {
        let e = entry(DETACH_VECTOR);
        assert_eq!(e.trigger, Trigger::Fixed);
        assert!(e.is_reserved_on(Core::Zero));
        assert!(e.is_reserved_on(Core::One));
    }
}
