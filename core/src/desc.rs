//! # Vector Descriptors
//!
//! Runtime bookkeeping for each (core, vector) pair. Descriptors are
//! created lazily on first touch and live for the process lifetime;
//! freeing a vector resets its state to [`VectorState::Free`] so the
//! slot is reusable, it never removes the descriptor.

use alloc::vec::Vec;

use lattice_hal::handlers::RawHandler;

use crate::source::Source;

/// Descriptor key: (core id, vector number).
pub(crate) type DescKey = (usize, u8);

/// Status-register filter for one shared registration.
///
/// Before invoking the entry's handler, the shared trampoline
/// volatile-reads the register and skips the entry when no masked bit
/// is set, filtering spurious dispatches.
#[derive(Debug, Clone, Copy)]
pub struct StatusCheck {
    reg: *const u32,
    mask: u32,
}

impl StatusCheck {
    /// Build a filter from a status register address and bitmask.
    pub const fn new(reg: *const u32, mask: u32) -> Self {
        Self { reg, mask }
    }

    /// Whether the masked status currently reads non-zero.
    ///
    /// Validity of `reg` is the contract of the allocation call that
    /// registered this filter.
    #[inline]
    pub(crate) fn is_asserted(&self) -> bool {
        // SAFETY: `reg` outlives the registration per the allocation
        // call's contract.
        let status = unsafe { core::ptr::read_volatile(self.reg) };
        status & self.mask != 0
    }
}

/// One registration on a shared vector.
pub(crate) struct SharedEntry {
    /// Unique id linking a handle back to this entry.
    pub token: u32,
    pub source: Source,
    pub disabled: bool,
    pub status: Option<StatusCheck>,
    pub handler: RawHandler,
    pub arg: *mut (),
}

// SAFETY: the argument and status pointers are only used by the handler
// they were registered with.
unsafe impl Send for SharedEntry {}

/// Primary state of a vector. The variants are mutually exclusive by
/// construction: a vector is never both shared and exclusively owned.
pub(crate) enum VectorState {
    /// Unallocated.
    Free,
    /// Reserved at runtime; never returned by the search.
    Reserved,
    /// Exclusively owned by one source.
    NonShared { source: Source },
    /// Serviced by a trampoline fanning out to a chain of entries.
    ///
    /// The chain is never empty while this state holds; the last unlink
    /// frees the vector.
    Shared { entries: Vec<SharedEntry> },
}

/// Runtime descriptor of one (core, vector) slot.
pub(crate) struct VectorDesc {
    pub state: VectorState,
    /// Handlers on this vector stay reachable with caches disabled.
    pub fast_mem: bool,
}

impl VectorDesc {
    pub(crate) const fn free() -> Self {
        Self {
            state: VectorState::Free,
            fast_mem: false,
        }
    }

    pub(crate) fn is_free(&self) -> bool {
        matches!(self.state, VectorState::Free)
    }

    /// Number of registrations on a shared vector (0 otherwise).
    pub(crate) fn shared_len(&self) -> usize {
        match &self.state {
            VectorState::Shared { entries } => entries.len(),
            _ => 0,
        }
    }

    /// Whether any registration in this descriptor targets `source`.
    pub(crate) fn carries_source(&self, source: Source) -> bool {
        match &self.state {
            VectorState::NonShared { source: s } => *s == source,
            VectorState::Shared { entries } => entries.iter().any(|e| e.source == source),
            _ => false,
        }
    }

    pub(crate) fn entry_mut(&mut self, token: u32) -> Option<&mut SharedEntry> {
        match &mut self.state {
            VectorState::Shared { entries } => entries.iter_mut().find(|e| e.token == token),
            _ => None,
        }
    }

    /// Unlink the entry with `token`, returning it.
    pub(crate) fn unlink(&mut self, token: u32) -> Option<SharedEntry> {
        match &mut self.state {
            VectorState::Shared { entries } => {
                let idx = entries.iter().position(|e| e.token == token)?;
                Some(entries.remove(idx))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::periph;

    fn nop(_arg: *mut ()) {}

    fn entry(token: u32, source: Source) -> SharedEntry {
        SharedEntry {
            token,
            source,
            disabled: false,
            status: None,
            handler: nop,
            arg: core::ptr::null_mut(),
        }
    }

    #[test]
    fn test_unlink_by_token() {
        let mut d = VectorDesc::free();
        d.state = VectorState::Shared {
            entries: vec![entry(1, periph::UART0), entry(2, periph::UART1)],
        };
        assert_eq!(d.shared_len(), 2);

        let removed = d.unlink(1).unwrap();
        assert_eq!(removed.token, 1);
        assert_eq!(d.shared_len(), 1);
        assert!(d.unlink(1).is_none());
    }

    #[test]
    fn test_carries_source() {
        let mut d = VectorDesc::free();
        assert!(!d.carries_source(periph::UART0));

        d.state = VectorState::NonShared {
            source: periph::UART0,
        };
        assert!(d.carries_source(periph::UART0));
        assert!(!d.carries_source(periph::UART1));
    }

    #[test]
    fn test_status_check() {
        use core::sync::atomic::AtomicU32;
        static STATUS: AtomicU32 = AtomicU32::new(0);

        let check = StatusCheck::new(STATUS.as_ptr(), 0b100);
        assert!(!check.is_asserted());
        STATUS.store(0b110, core::sync::atomic::Ordering::SeqCst);
        assert!(check.is_asserted());
    }
}
