//! # CPU Core Identity
//!
//! Core identifiers for the two-core target, plus the pluggable
//! current-core query used by everything that must know which core it
//! runs on.
//!
//! The query is a plain function pointer supplied when the hardware
//! model is constructed: the platform wires it to the CPU-id register
//! read, hosted tests wire it to whatever they need. The default always
//! reports the boot core.

/// Number of CPU cores served by the interrupt matrix.
pub const CORE_COUNT: usize = 2;

/// A CPU core identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Core {
    /// The boot core.
    Zero = 0,
    /// The second core.
    One  = 1,
}

impl Core {
    /// Numeric id of this core.
    #[inline]
    pub const fn id(self) -> usize {
        self as usize
    }

    /// Convert from a numeric core id.
    #[inline]
    pub const fn from_id(id: usize) -> Option<Core> {
        match id {
            0 => Some(Core::Zero),
            1 => Some(Core::One),
            _ => None,
        }
    }

    /// The other core of the pair.
    #[inline]
    pub const fn other(self) -> Core {
        match self {
            Core::Zero => Core::One,
            Core::One => Core::Zero,
        }
    }
}

/// Query returning the numeric id of the core executing the caller.
pub type CoreIdFn = fn() -> usize;

/// Default current-core query: always the boot core.
pub fn boot_core() -> usize {
    0
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_ids() {
        assert_eq!(Core::Zero.id(), 0);
        assert_eq!(Core::One.id(), 1);
        assert_eq!(Core::from_id(1), Some(Core::One));
        assert_eq!(Core::from_id(2), None);
    }

    #[test]
    fn test_other_core() {
        assert_eq!(Core::Zero.other(), Core::One);
        assert_eq!(Core::One.other(), Core::Zero);
    }
}
