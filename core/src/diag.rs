//! # Diagnostics
//!
//! Structured and printable views of the allocator's vector table,
//! plus the per-vector dispatch counters kept by the hardware model.

use core::fmt;

use lattice_hal::vectors::{self, Trigger, VectorClass, VECTOR_COUNT};
use lattice_hal::Core;

use crate::allocator::InterruptAllocator;
use crate::desc::VectorState;
use crate::source::Source;

/// Runtime usage of one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// Unallocated.
    Free,
    /// Reserved at runtime.
    Reserved,
    /// Exclusively owned by one source.
    Exclusive(Source),
    /// Shared, with the given number of attached registrations.
    Shared(usize),
}

/// Snapshot of one (core, vector) slot.
#[derive(Debug, Clone)]
pub struct VectorInfo {
    /// Vector number.
    pub vector: u8,
    /// Hardware priority level.
    pub level: u8,
    /// Trigger type.
    pub trigger: Trigger,
    /// Hardware usability class on the queried core.
    pub class: VectorClass,
    /// Runtime usage.
    pub usage: Usage,
    /// Fast-memory residency flag.
    pub fast_mem: bool,
    /// CPU-level enable bit.
    pub enabled: bool,
    /// Times the vector has fired.
    pub hits: u64,
}

impl InterruptAllocator {
    /// Snapshot one vector's state on `core`.
    ///
    /// Returns `None` for out-of-range vector numbers.
    pub fn vector_info(&self, core: Core, vector: u8) -> Option<VectorInfo> {
        if (vector as usize) >= VECTOR_COUNT {
            return None;
        }
        let entry = vectors::entry(vector);
        let st = self.state.lock();
        let (usage, fast_mem) = match st.descs.get(&(core.id(), vector)) {
            None => (Usage::Free, false),
            Some(desc) => {
                let usage = match &desc.state {
                    VectorState::Free => Usage::Free,
                    VectorState::Reserved => Usage::Reserved,
                    VectorState::NonShared { source } => Usage::Exclusive(*source),
                    VectorState::Shared { entries } => Usage::Shared(entries.len()),
                };
                (usage, desc.fast_mem)
            }
        };
        drop(st);

        Some(VectorInfo {
            vector,
            level: entry.level,
            trigger: entry.trigger,
            class: entry.class_on(core),
            usage,
            fast_mem,
            enabled: self.hw.control().is_enabled(core, vector),
            hits: self.hw.handlers().hits(core, vector),
        })
    }

    /// Render the full vector table of both cores.
    pub fn dump<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        for core in [Core::Zero, Core::One] {
            writeln!(w, "Core {} interrupt status:", core.id())?;
            writeln!(w, " Vec  Lvl  Trigger  Class     Usage")?;
            for vector in 0..VECTOR_COUNT as u8 {
                let Some(info) = self.vector_info(core, vector) else {
                    continue;
                };
                let trigger = match info.trigger {
                    Trigger::Level => "level",
                    Trigger::Edge => "edge",
                    Trigger::Fixed => "fixed",
                };
                let class = match info.class {
                    VectorClass::Normal => "normal",
                    VectorClass::Reserved => "reserved",
                    VectorClass::Special => "special",
                };
                write!(w, " {:>3}  {:>3}  {:<7}  {:<8}  ", info.vector, info.level, trigger, class)?;
                match info.usage {
                    Usage::Free => write!(w, "free")?,
                    Usage::Reserved => write!(w, "reserved")?,
                    Usage::Exclusive(source) => write!(w, "used by {:?}", source)?,
                    Usage::Shared(count) => write!(w, "shared ({} entries)", count)?,
                }
                if info.fast_mem {
                    write!(w, " [fast-mem]")?;
                }
                if info.enabled {
                    write!(w, " [enabled]")?;
                }
                if info.hits > 0 {
                    write!(w, " [{} hits]", info.hits)?;
                }
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use core::ptr;

    use super::*;
    use crate::flags::AllocFlags;
    use crate::source::periph;

    fn nop(_arg: *mut ()) {}

    fn fresh() -> &'static InterruptAllocator {
        Box::leak(Box::new(InterruptAllocator::new()))
    }

    #[test]
    fn test_vector_info_tracks_usage() {
        let a = fresh();
        let h = unsafe { a.alloc(periph::UART0, AllocFlags::empty(), Some(nop), ptr::null_mut()) }
            .unwrap();

        let info = a.vector_info(Core::Zero, h.vector()).unwrap();
        assert_eq!(info.usage, Usage::Exclusive(periph::UART0));
        assert!(info.enabled);
        assert_eq!(info.hits, 0);

        unsafe { a.hardware().handlers().invoke(Core::Zero, h.vector()) };
        let info = a.vector_info(Core::Zero, h.vector()).unwrap();
        assert_eq!(info.hits, 1);

        assert!(a.vector_info(Core::Zero, VECTOR_COUNT as u8).is_none());
    }

    #[test]
    fn test_dump_renders_allocations() {
        let a = fresh();
        let _h = unsafe {
            a.alloc(
                periph::GPIO,
                AllocFlags::FAST_MEM,
                Some(nop),
                ptr::null_mut(),
            )
        }
        .unwrap();
        a.reserve(Core::One, 9).unwrap();

        let mut out = String::new();
        a.dump(&mut out).unwrap();
        assert!(out.contains("Core 0 interrupt status:"));
        assert!(out.contains("used by Peripheral(12)"));
        assert!(out.contains("[fast-mem]"));
        assert!(out.contains("Core 1 interrupt status:"));
    }
}
