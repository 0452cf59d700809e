//! # Vector Allocator
//!
//! Runtime assignment of CPU interrupt vectors to interrupt sources
//! across both cores.
//!
//! ## Allocation Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        alloc(source, flags)                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  validate flags/source ──> internal source? ── force its vector │
//! │          │                                                      │
//! │          ▼                                                      │
//! │  source already registered? ── reuse that vector                │
//! │          │                                                      │
//! │          ▼                                                      │
//! │  forced vector? ── check that one slot only                     │
//! │          │                                                      │
//! │          ▼                                                      │
//! │  scan all vectors ── pick best usable ── commit:                │
//! │      descriptor + handler slot + matrix route + enable bit      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! The whole decide-and-commit sequence runs under one global spin
//! lock, so concurrent allocations from both cores can never race on a
//! descriptor or a matrix register. The shared-dispatch trampoline
//! takes the same lock while walking a chain; shared handlers therefore
//! run with the lock held and must not call back into the allocator.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use spin::Mutex;

use lattice_hal::cpu::CoreIdFn;
use lattice_hal::vectors::{self, Trigger, VectorClass, VECTOR_COUNT};
use lattice_hal::{Core, InterruptHardware, RawHandler, CORE_COUNT};

use crate::desc::{DescKey, SharedEntry, StatusCheck, VectorDesc, VectorState};
use crate::dispatch::{shared_trampoline, SharedCtx};
use crate::error::{IntrError, IntrResult};
use crate::flags::AllocFlags;
use crate::source::Source;

// =============================================================================
// State
// =============================================================================

pub(crate) struct AllocState {
    /// Lazily created descriptors, keyed by (core id, vector).
    pub descs: BTreeMap<DescKey, VectorDesc>,
    /// Next shared-entry token.
    next_token: u32,
    /// Vectors allocated without the fast-memory guarantee, per core.
    non_resident: [u32; CORE_COUNT],
    /// Enable mask saved by a pending fast-memory-only window, per core.
    suspended: [Option<u32>; CORE_COUNT],
}

/// The interrupt vector allocator.
///
/// Owns the machine's interrupt hardware model and all runtime
/// bookkeeping. One global instance serves the firmware (see
/// [`allocator()`]); tests construct their own.
pub struct InterruptAllocator {
    pub(crate) hw: InterruptHardware,
    pub(crate) state: Mutex<AllocState>,
}

impl core::fmt::Debug for InterruptAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InterruptAllocator").finish_non_exhaustive()
    }
}

/// Handle to one allocated interrupt.
///
/// Returned by the `alloc` family; consumed by [`InterruptAllocator::free`].
/// Deliberately neither `Copy` nor `Clone`, so a registration cannot be
/// released twice.
#[derive(Debug)]
pub struct IntrHandle {
    core: Core,
    vector: u8,
    source: Source,
    token: Option<u32>,
}

impl IntrHandle {
    /// Core the vector was allocated on.
    #[inline]
    pub fn core(&self) -> Core {
        self.core
    }

    /// The allocated vector number.
    #[inline]
    pub fn vector(&self) -> u8 {
        self.vector
    }

    /// The registered source.
    #[inline]
    pub fn source(&self) -> Source {
        self.source
    }

    /// Whether this registration sits on a shared vector.
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.token.is_some()
    }

    fn key(&self) -> DescKey {
        (self.core.id(), self.vector)
    }
}

// =============================================================================
// Global Instance
// =============================================================================

static ALLOCATOR: InterruptAllocator = InterruptAllocator::new();

/// The global allocator instance.
pub fn allocator() -> &'static InterruptAllocator {
    &ALLOCATOR
}

// =============================================================================
// Allocation
// =============================================================================

impl InterruptAllocator {
    /// Create an allocator with the default (boot-core-only) core query.
    pub const fn new() -> Self {
        Self {
            hw: InterruptHardware::new(),
            state: Mutex::new(AllocState {
                descs: BTreeMap::new(),
                next_token: 1,
                non_resident: [0; CORE_COUNT],
                suspended: [None; CORE_COUNT],
            }),
        }
    }

    /// Create an allocator with a platform-supplied core-id query.
    pub const fn with_core_id(core_id: CoreIdFn) -> Self {
        Self {
            hw: InterruptHardware::with_core_id(core_id),
            state: Mutex::new(AllocState {
                descs: BTreeMap::new(),
                next_token: 1,
                non_resident: [0; CORE_COUNT],
                suspended: [None; CORE_COUNT],
            }),
        }
    }

    /// The hardware model this allocator programs.
    #[inline]
    pub fn hardware(&self) -> &InterruptHardware {
        &self.hw
    }

    /// Allocate a vector for `source` on the calling core.
    ///
    /// Picks a free (or joinable shared) vector matching `flags`, binds
    /// `handler`, programs the matrix, and enables the interrupt unless
    /// [`AllocFlags::DISABLED`] was given.
    ///
    /// # Safety
    ///
    /// `arg` must remain valid until the returned handle is freed.
    pub unsafe fn alloc(
        &'static self,
        source: Source,
        flags: AllocFlags,
        handler: Option<RawHandler>,
        arg: *mut (),
    ) -> IntrResult<IntrHandle> {
        unsafe { self.alloc_inner(source, None, flags, None, handler, arg) }
    }

    /// Allocate a shared vector whose dispatch is filtered by a status
    /// register: the handler only runs when `status` reads non-zero.
    ///
    /// # Safety
    ///
    /// `arg` and the register behind `status` must remain valid until
    /// the returned handle is freed.
    pub unsafe fn alloc_with_status(
        &'static self,
        source: Source,
        flags: AllocFlags,
        status: StatusCheck,
        handler: RawHandler,
        arg: *mut (),
    ) -> IntrResult<IntrHandle> {
        if !flags.contains(AllocFlags::SHARED) {
            return Err(IntrError::InvalidFlags);
        }
        unsafe { self.alloc_inner(source, None, flags, Some(status), Some(handler), arg) }
    }

    /// Allocate `source` onto one specific vector, never searching.
    ///
    /// # Safety
    ///
    /// `arg` must remain valid until the returned handle is freed.
    pub unsafe fn alloc_to_vector(
        &'static self,
        source: Source,
        vector: u8,
        flags: AllocFlags,
        handler: Option<RawHandler>,
        arg: *mut (),
    ) -> IntrResult<IntrHandle> {
        unsafe { self.alloc_inner(source, Some(vector), flags, None, handler, arg) }
    }

    unsafe fn alloc_inner(
        &'static self,
        source: Source,
        forced: Option<u8>,
        flags: AllocFlags,
        status: Option<StatusCheck>,
        handler: Option<RawHandler>,
        arg: *mut (),
    ) -> IntrResult<IntrHandle> {
        source.validate()?;
        let flags = flags.with_default_levels();
        flags.validate(handler.is_some())?;
        if let Some(v) = forced {
            if (v as usize) >= VECTOR_COUNT {
                return Err(IntrError::InvalidVector);
            }
        }

        // Internal sources override everything: the OS's low-level
        // mechanisms must land on stable vectors.
        let forced = match source.forced_vector() {
            Some(wired) => {
                if forced.is_some_and(|f| f != wired) {
                    return Err(IntrError::InvalidVector);
                }
                Some(wired)
            }
            None => forced,
        };

        let core = self.hw.current_core();
        let mut st = self.state.lock();

        // Reuse the vector an earlier allocation of this source got.
        let forced = match (find_registered(&st, core, source), forced) {
            (Some(existing), Some(f)) if existing != f => return Err(IntrError::InvalidVector),
            (Some(existing), _) => Some(existing),
            (None, f) => f,
        };

        let vector = match forced {
            Some(v) => {
                if !self.vector_usable(&st, core, v, source, flags, true) {
                    return Err(IntrError::NotFound);
                }
                v
            }
            None => self
                .search(&st, core, source, flags)
                .ok_or(IntrError::NotFound)?,
        };

        self.commit(&mut st, core, vector, source, flags, status, handler, arg)
    }

    /// Check whether one vector can serve this request.
    fn vector_usable(
        &self,
        st: &AllocState,
        core: Core,
        vector: u8,
        source: Source,
        flags: AllocFlags,
        forced: bool,
    ) -> bool {
        let entry = vectors::entry(vector);

        match entry.class_on(core) {
            VectorClass::Reserved => return false,
            VectorClass::Special if !forced => return false,
            _ => {}
        }
        if !flags.allows_level(entry.level) {
            return false;
        }
        match entry.trigger {
            Trigger::Level => {
                if flags.contains(AllocFlags::EDGE) {
                    return false;
                }
            }
            Trigger::Edge => {
                if !flags.contains(AllocFlags::EDGE) {
                    return false;
                }
            }
            // Hard-wired vectors only serve explicitly forced requests.
            Trigger::Fixed => {
                if !forced {
                    return false;
                }
            }
        }

        let shared_req = flags.contains(AllocFlags::SHARED);
        let desc = st.descs.get(&(core.id(), vector));
        match desc.map(|d| &d.state) {
            None | Some(VectorState::Free) => {
                if shared_req {
                    true
                } else {
                    // A live handler bound outside the allocator means
                    // something seized this vector directly.
                    !self.hw.handlers().is_bound(core, vector)
                }
            }
            Some(VectorState::Reserved) => false,
            Some(VectorState::NonShared { source: owner }) => !shared_req && *owner == source,
            Some(VectorState::Shared { .. }) => {
                shared_req
                    && desc.map(|d| d.fast_mem) == Some(flags.contains(AllocFlags::FAST_MEM))
            }
        }
    }

    /// Scan all vectors for the best usable one.
    fn search(&self, st: &AllocState, core: Core, source: Source, flags: AllocFlags) -> Option<u8> {
        let shared_req = flags.contains(AllocFlags::SHARED);
        // (vector, attached entries, level)
        let mut best_shared: Option<(u8, usize, u8)> = None;
        // (vector, level)
        let mut best_free: Option<(u8, u8)> = None;

        for v in 0..VECTOR_COUNT as u8 {
            if !self.vector_usable(st, core, v, source, flags, false) {
                continue;
            }
            let level = vectors::entry(v).level;

            let attached = st
                .descs
                .get(&(core.id(), v))
                .map(|d| d.shared_len())
                .unwrap_or(0);

            if shared_req && attached > 0 {
                // Joining an existing chain: fewest entries wins, lower
                // level breaks ties.
                let better = match best_shared {
                    None => true,
                    Some((_, count, lvl)) => {
                        attached < count || (attached == count && level < lvl)
                    }
                };
                if better {
                    best_shared = Some((v, attached, level));
                }
            } else if best_free.map_or(true, |(_, lvl)| level < lvl) {
                best_free = Some((v, level));
            }
        }

        best_shared
            .map(|(v, _, _)| v)
            .or(best_free.map(|(v, _)| v))
    }

    /// Commit the chosen vector: descriptor, handler slot, matrix, enable.
    #[allow(clippy::too_many_arguments)]
    fn commit(
        &'static self,
        st: &mut AllocState,
        core: Core,
        vector: u8,
        source: Source,
        flags: AllocFlags,
        status: Option<StatusCheck>,
        handler: Option<RawHandler>,
        arg: *mut (),
    ) -> IntrResult<IntrHandle> {
        let shared = flags.contains(AllocFlags::SHARED);
        let fast_mem = flags.contains(AllocFlags::FAST_MEM);
        let mut token = None;

        if shared {
            let Some(handler) = handler else {
                return Err(IntrError::InvalidFlags);
            };
            let t = st.next_token;
            st.next_token = st.next_token.wrapping_add(1);

            let desc = st
                .descs
                .entry((core.id(), vector))
                .or_insert_with(VectorDesc::free);
            if desc.is_free() {
                desc.state = VectorState::Shared {
                    entries: Vec::new(),
                };
                desc.fast_mem = fast_mem;
                let ctx = Box::into_raw(Box::new(SharedCtx {
                    alloc: self,
                    core,
                    vector,
                }));
                // SAFETY: the context stays valid until the last entry
                // unlinks; free() reclaims it before unbinding.
                unsafe {
                    self.hw
                        .handlers()
                        .bind(core, vector, shared_trampoline, ctx.cast())
                };
            }
            if let VectorState::Shared { entries } = &mut desc.state {
                entries.insert(
                    0,
                    SharedEntry {
                        token: t,
                        source,
                        disabled: false,
                        status,
                        handler,
                        arg,
                    },
                );
            }
            token = Some(t);
        } else {
            let desc = st
                .descs
                .entry((core.id(), vector))
                .or_insert_with(VectorDesc::free);
            desc.state = VectorState::NonShared { source };
            desc.fast_mem = fast_mem;
            if let Some(handler) = handler {
                // SAFETY: validity of `arg` is the alloc caller's
                // contract, upheld until free().
                unsafe { self.hw.handlers().bind(core, vector, handler, arg) };
            }
        }

        // Residency bookkeeping for fast-memory-only windows.
        if fast_mem {
            st.non_resident[core.id()] &= !(1u32 << vector);
        } else {
            st.non_resident[core.id()] |= 1u32 << vector;
        }

        // Peripheral gating happens at the mux; the CPU-level bit stays
        // on once the vector carries any peripheral source.
        if !source.is_internal() {
            self.hw.control().enable(core, vector);
        }

        let handle = IntrHandle {
            core,
            vector,
            source,
            token,
        };
        if flags.contains(AllocFlags::DISABLED) {
            self.disable_locked(&mut *st, &handle)?;
        } else {
            self.enable_locked(&mut *st, &handle)?;
        }

        log::debug!(
            "intr: {:?} -> vector {} on core {} ({})",
            source,
            vector,
            core.id(),
            if shared { "shared" } else { "exclusive" }
        );
        Ok(handle)
    }

    // =========================================================================
    // Enable / Disable / Free
    // =========================================================================

    /// Re-enable the registration behind `handle`.
    ///
    /// Peripheral sources are re-routed in the matrix (works from any
    /// core); internal sources toggle the CPU enable bit and must be
    /// enabled from the owning core.
    pub fn enable(&self, handle: &IntrHandle) -> IntrResult<()> {
        let mut st = self.state.lock();
        self.enable_locked(&mut st, handle)
    }

    /// Gate the registration behind `handle` without releasing it.
    ///
    /// On a shared vector only this entry stops being dispatched;
    /// sibling entries are unaffected.
    pub fn disable(&self, handle: &IntrHandle) -> IntrResult<()> {
        let mut st = self.state.lock();
        self.disable_locked(&mut st, handle)
    }

    fn enable_locked(&self, st: &mut AllocState, handle: &IntrHandle) -> IntrResult<()> {
        if handle.source.is_internal() && self.hw.current_core() != handle.core {
            return Err(IntrError::CoreMismatch);
        }
        if let Some(token) = handle.token {
            if let Some(desc) = st.descs.get_mut(&handle.key()) {
                if let Some(entry) = desc.entry_mut(token) {
                    entry.disabled = false;
                }
            }
        }
        match handle.source {
            Source::Peripheral(n) => self.hw.matrix().route(handle.core, n, handle.vector),
            Source::Internal(_) => self.hw.control().enable(handle.core, handle.vector),
        }
        Ok(())
    }

    fn disable_locked(&self, st: &mut AllocState, handle: &IntrHandle) -> IntrResult<()> {
        if handle.source.is_internal() && self.hw.current_core() != handle.core {
            return Err(IntrError::CoreMismatch);
        }
        let mut gate = true;
        if let Some(token) = handle.token {
            if let Some(desc) = st.descs.get_mut(&handle.key()) {
                if let Some(entry) = desc.entry_mut(token) {
                    entry.disabled = true;
                }
                // Keep the mux routed while a sibling entry still
                // listens on the same source.
                if let VectorState::Shared { entries } = &desc.state {
                    gate = !entries
                        .iter()
                        .any(|e| e.source == handle.source && !e.disabled);
                }
            }
        }
        match handle.source {
            Source::Peripheral(n) => {
                if gate {
                    self.hw.matrix().detach(handle.core, n);
                } else {
                    self.hw.matrix().route(handle.core, n, handle.vector);
                }
            }
            Source::Internal(_) => self.hw.control().disable(handle.core, handle.vector),
        }
        Ok(())
    }

    /// Release the registration behind `handle`.
    ///
    /// Must run on the owning core. Unlinks a shared entry (the last
    /// unlink frees the vector and detaches the trampoline) or clears
    /// exclusive ownership, restores the unhandled sentinel, and resets
    /// the residency bookkeeping.
    ///
    /// On error the registration stays installed.
    pub fn free(&self, handle: IntrHandle) -> IntrResult<()> {
        if self.hw.current_core() != handle.core {
            return Err(IntrError::CoreMismatch);
        }
        let mut st = self.state.lock();
        self.disable_locked(&mut st, &handle)?;

        let Some(desc) = st.descs.get_mut(&handle.key()) else {
            return Ok(());
        };

        let release = match handle.token {
            Some(token) => {
                desc.unlink(token);
                desc.shared_len() == 0
            }
            None => matches!(desc.state, VectorState::NonShared { .. }),
        };

        if release {
            let slot = self.hw.handlers().get(handle.core, handle.vector);
            if slot.handler() as usize == shared_trampoline as usize {
                // SAFETY: bound by commit() as a leaked SharedCtx; this
                // was the last unlink, so nothing can reach it anymore.
                drop(unsafe { Box::from_raw(slot.arg() as *mut SharedCtx) });
            }
            desc.state = VectorState::Free;
            desc.fast_mem = false;
            self.hw.handlers().unbind(handle.core, handle.vector);
            self.hw.control().disable(handle.core, handle.vector);
            st.non_resident[handle.core.id()] &= !(1u32 << handle.vector);
            log::debug!(
                "intr: vector {} on core {} released",
                handle.vector,
                handle.core.id()
            );
        }
        Ok(())
    }

    // =========================================================================
    // Reservation
    // =========================================================================

    /// Reserve `vector` on `core` so the search never hands it out.
    ///
    /// Meant for init-time carve-outs. Fails with [`IntrError::InUse`]
    /// if the vector is already allocated or reserved.
    pub fn reserve(&self, core: Core, vector: u8) -> IntrResult<()> {
        if (vector as usize) >= VECTOR_COUNT {
            return Err(IntrError::InvalidVector);
        }
        let mut st = self.state.lock();
        let desc = st
            .descs
            .entry((core.id(), vector))
            .or_insert_with(VectorDesc::free);
        if !desc.is_free() {
            return Err(IntrError::InUse);
        }
        desc.state = VectorState::Reserved;
        log::debug!("intr: vector {} on core {} reserved", vector, core.id());
        Ok(())
    }

    // =========================================================================
    // Fast-Memory Windows
    // =========================================================================

    /// Mask every enabled vector on the calling core whose handlers are
    /// not fast-memory resident, recording the set for resume.
    ///
    /// Used around windows where normal memory is unreachable (cache
    /// disabled for a flash operation).
    pub fn suspend_non_resident(&self) -> IntrResult<()> {
        let core = self.hw.current_core();
        let mut st = self.state.lock();
        if st.suspended[core.id()].is_some() {
            return Err(IntrError::InUse);
        }
        let mask = st.non_resident[core.id()] & self.hw.control().mask(core);
        self.hw.control().disable_mask(core, mask);
        st.suspended[core.id()] = Some(mask);
        log::debug!(
            "intr: core {} suspended non-resident mask {:#010x}",
            core.id(),
            mask
        );
        Ok(())
    }

    /// Restore the vectors masked by the matching
    /// [`suspend_non_resident`](Self::suspend_non_resident).
    pub fn resume_non_resident(&self) -> IntrResult<()> {
        let core = self.hw.current_core();
        let mut st = self.state.lock();
        let mask = st.suspended[core.id()]
            .take()
            .ok_or(IntrError::NotSuspended)?;
        self.hw.control().enable_mask(core, mask);
        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Walk the shared chain of `vector`, invoking every entry that is
    /// enabled and whose status condition holds.
    ///
    /// Runs under the allocator lock, so chain mutation is atomic with
    /// respect to dispatch.
    pub(crate) fn dispatch_shared(&self, core: Core, vector: u8) {
        let st = self.state.lock();
        if let Some(desc) = st.descs.get(&(core.id(), vector)) {
            if let VectorState::Shared { entries } = &desc.state {
                for entry in entries {
                    if entry.disabled {
                        continue;
                    }
                    if let Some(status) = &entry.status {
                        if !status.is_asserted() {
                            continue;
                        }
                    }
                    (entry.handler)(entry.arg);
                }
            }
        }
    }

    // =========================================================================
    // Test Support
    // =========================================================================

    /// Structural invariant checks used by the stress tests.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let st = self.state.lock();
        let mut tokens = std::collections::BTreeSet::new();
        for (&(core_id, vector), desc) in st.descs.iter() {
            let core = Core::from_id(core_id).expect("bad core id in descriptor key");
            match &desc.state {
                VectorState::Shared { entries } => {
                    assert!(
                        !entries.is_empty(),
                        "empty shared chain on core {core_id} vector {vector}"
                    );
                    for entry in entries {
                        assert!(tokens.insert(entry.token), "duplicate shared token");
                    }
                    let slot = self.hw.handlers().get(core, vector);
                    assert_eq!(
                        slot.handler() as usize,
                        shared_trampoline as usize,
                        "shared vector without trampoline"
                    );
                }
                VectorState::NonShared { source } => {
                    if let Source::Peripheral(n) = source {
                        let mapped = self.hw.matrix().mapping(core, *n);
                        assert!(
                            mapped == vector || self.hw.matrix().is_detached(core, *n),
                            "mux and descriptor disagree on source {n}"
                        );
                    }
                }
                _ => {}
            }
        }
    }
}

fn find_registered(st: &AllocState, core: Core, source: Source) -> Option<u8> {
    let lo = (core.id(), 0u8);
    let hi = (core.id(), (VECTOR_COUNT - 1) as u8);
    st.descs
        .range(lo..=hi)
        .find(|(_, d)| d.carries_source(source))
        .map(|(&(_, vector), _)| vector)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use core::ptr;
    use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::cell::Cell;

    use lattice_hal::matrix::SOURCE_COUNT;

    use super::*;
    use crate::flags::AllocFlags as F;
    use crate::source::{periph, InternalSource};

    std::thread_local! {
        static TEST_CORE: Cell<usize> = const { Cell::new(0) };
    }

    fn test_core_id() -> usize {
        TEST_CORE.with(|c| c.get())
    }

    fn on_core(id: usize) {
        TEST_CORE.with(|c| c.set(id));
    }

    fn fresh() -> &'static InterruptAllocator {
        on_core(0);
        Box::leak(Box::new(InterruptAllocator::with_core_id(test_core_id)))
    }

    fn nop(_arg: *mut ()) {}

    fn bump(arg: *mut ()) {
        // SAFETY: tests always pass a pointer to a static AtomicUsize.
        unsafe { &*(arg as *const AtomicUsize) }.fetch_add(1, Ordering::SeqCst);
    }

    fn counter_arg(counter: &'static AtomicUsize) -> *mut () {
        counter as *const AtomicUsize as *mut ()
    }

    #[test]
    fn test_exclusive_vectors_are_unique() {
        let a = fresh();
        let h1 = unsafe { a.alloc(periph::UART0, F::empty(), Some(nop), ptr::null_mut()) }.unwrap();
        let h2 = unsafe { a.alloc(periph::UART1, F::empty(), Some(nop), ptr::null_mut()) }.unwrap();
        assert_ne!(h1.vector(), h2.vector());
    }

    #[test]
    fn test_same_source_reuses_vector() {
        let a = fresh();
        let h1 = unsafe { a.alloc(periph::GPIO, F::empty(), Some(nop), ptr::null_mut()) }.unwrap();
        let h2 = unsafe { a.alloc(periph::GPIO, F::empty(), Some(nop), ptr::null_mut()) }.unwrap();
        assert_eq!(h1.vector(), h2.vector());
    }

    #[test]
    fn test_hardware_reserved_never_allocated() {
        let cases: [(F, Option<RawHandler>); 4] = [
            (F::empty(), Some(nop)),
            (F::EDGE, Some(nop)),
            (F::LEVEL4 | F::LEVEL5 | F::EDGE, None),
            (F::SHARED, Some(nop)),
        ];
        for (flags, handler) in cases {
            // Drain a fresh allocator with this flag set; nothing handed
            // out may be a hardware-reserved vector.
            let a = fresh();
            let mut src = 0u8;
            while (src as usize) < SOURCE_COUNT {
                match unsafe { a.alloc(Source::Peripheral(src), flags, handler, ptr::null_mut()) }
                {
                    Ok(h) => {
                        let entry = vectors::entry(h.vector());
                        assert_ne!(entry.class_on(Core::Zero), VectorClass::Reserved);
                        src += 1;
                    }
                    Err(IntrError::NotFound) => break,
                    Err(e) => panic!("unexpected error: {e:?}"),
                }
            }
        }
    }

    #[test]
    fn test_last_shared_unlink_frees_vector() {
        let a = fresh();
        let h1 = unsafe { a.alloc(periph::SPI0, F::SHARED, Some(nop), ptr::null_mut()) }.unwrap();
        let h2 = unsafe { a.alloc(periph::SPI1, F::SHARED, Some(nop), ptr::null_mut()) }.unwrap();
        assert_eq!(h1.vector(), h2.vector());
        let v = h1.vector();

        a.free(h1).unwrap();
        // Still shared: an exclusive request must avoid the vector.
        let h3 = unsafe { a.alloc(periph::I2C0, F::empty(), Some(nop), ptr::null_mut()) }.unwrap();
        assert_ne!(h3.vector(), v);

        a.free(h2).unwrap();
        // Fully released: an exclusive registration can take the slot.
        let h4 =
            unsafe { a.alloc_to_vector(periph::GPIO, v, F::empty(), Some(nop), ptr::null_mut()) }
                .unwrap();
        assert_eq!(h4.vector(), v);
    }

    #[test]
    fn test_disable_entry_keeps_siblings() {
        static C1: AtomicUsize = AtomicUsize::new(0);
        static C2: AtomicUsize = AtomicUsize::new(0);

        let a = fresh();
        let h1 = unsafe { a.alloc(periph::DMA_CH0, F::SHARED, Some(bump), counter_arg(&C1)) }
            .unwrap();
        let h2 = unsafe { a.alloc(periph::DMA_CH1, F::SHARED, Some(bump), counter_arg(&C2)) }
            .unwrap();
        assert_eq!(h1.vector(), h2.vector());

        a.disable(&h1).unwrap();
        unsafe { a.hardware().handlers().invoke(Core::Zero, h1.vector()) };
        assert_eq!(C1.load(Ordering::SeqCst), 0);
        assert_eq!(C2.load(Ordering::SeqCst), 1);

        a.enable(&h1).unwrap();
        unsafe { a.hardware().handlers().invoke(Core::Zero, h1.vector()) };
        assert_eq!(C1.load(Ordering::SeqCst), 1);
        assert_eq!(C2.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_alloc_free_round_trip() {
        let a = fresh();
        let snapshot = |a: &InterruptAllocator| -> Vec<_> {
            (0..VECTOR_COUNT as u8)
                .map(|v| {
                    let info = a.vector_info(Core::Zero, v).unwrap();
                    (info.usage, info.fast_mem, info.enabled)
                })
                .collect()
        };

        let before = snapshot(a);
        let h = unsafe { a.alloc(periph::UART0, F::FAST_MEM, Some(nop), ptr::null_mut()) }.unwrap();
        assert_ne!(snapshot(a), before);
        a.free(h).unwrap();
        assert_eq!(snapshot(a), before);
    }

    #[test]
    fn test_forced_reserved_vector_fails() {
        let a = fresh();
        let r = unsafe { a.alloc_to_vector(periph::UART0, 0, F::empty(), Some(nop), ptr::null_mut()) };
        assert!(matches!(r, Err(IntrError::NotFound)));

        // The NMI vector is reserved too, independent of level flags.
        let r = unsafe { a.alloc_to_vector(periph::UART1, 14, F::LEVEL7, None, ptr::null_mut()) };
        assert!(matches!(r, Err(IntrError::NotFound)));

        let r = unsafe {
            a.alloc_to_vector(periph::UART1, VECTOR_COUNT as u8, F::empty(), Some(nop), ptr::null_mut())
        };
        assert!(matches!(r, Err(IntrError::InvalidVector)));
    }

    #[test]
    fn test_runtime_reservation() {
        let a = fresh();
        a.reserve(Core::Zero, 2).unwrap();
        let h = unsafe { a.alloc(periph::UART0, F::empty(), Some(nop), ptr::null_mut()) }.unwrap();
        assert_ne!(h.vector(), 2);
        assert!(matches!(a.reserve(Core::Zero, 2), Err(IntrError::InUse)));
        assert!(matches!(
            unsafe { a.alloc_to_vector(periph::UART1, 2, F::empty(), Some(nop), ptr::null_mut()) },
            Err(IntrError::NotFound)
        ));
    }

    #[test]
    fn test_internal_source_forced_vector() {
        let a = fresh();
        let h = unsafe {
            a.alloc(
                Source::Internal(InternalSource::Software0),
                F::empty(),
                Some(nop),
                ptr::null_mut(),
            )
        }
        .unwrap();
        assert_eq!(h.vector(), 7);
        assert!(a.hardware().control().is_enabled(Core::Zero, 7));

        // A caller-forced vector that disagrees with the wiring fails.
        let r = unsafe {
            a.alloc_to_vector(
                Source::Internal(InternalSource::Software1),
                7,
                F::empty(),
                Some(nop),
                ptr::null_mut(),
            )
        };
        assert!(matches!(r, Err(IntrError::InvalidVector)));

        // Internal sources gate at the CPU bit: owning core only.
        on_core(1);
        assert!(matches!(a.disable(&h), Err(IntrError::CoreMismatch)));
        on_core(0);
        a.disable(&h).unwrap();
        assert!(!a.hardware().control().is_enabled(Core::Zero, 7));
    }

    #[test]
    fn test_cross_core_peripheral_gating() {
        let a = fresh();
        let h = unsafe { a.alloc(periph::GPIO, F::empty(), Some(nop), ptr::null_mut()) }.unwrap();
        let Source::Peripheral(n) = h.source() else {
            panic!("expected peripheral source");
        };
        assert_eq!(a.hardware().matrix().mapping(Core::Zero, n), h.vector());

        // Peripheral gating happens in the mux and works from either core.
        on_core(1);
        a.disable(&h).unwrap();
        assert!(a.hardware().matrix().is_detached(Core::Zero, n));
        a.enable(&h).unwrap();
        assert_eq!(a.hardware().matrix().mapping(Core::Zero, n), h.vector());
        on_core(0);
    }

    #[test]
    fn test_free_requires_owning_core() {
        let a = fresh();
        let h = unsafe { a.alloc(periph::UART0, F::empty(), Some(nop), ptr::null_mut()) }.unwrap();
        on_core(1);
        assert!(matches!(a.free(h), Err(IntrError::CoreMismatch)));
        on_core(0);
    }

    #[test]
    fn test_start_disabled() {
        let a = fresh();
        let h =
            unsafe { a.alloc(periph::UART1, F::DISABLED, Some(nop), ptr::null_mut()) }.unwrap();
        let Source::Peripheral(n) = h.source() else {
            panic!("expected peripheral source");
        };
        assert!(a.hardware().matrix().is_detached(Core::Zero, n));

        a.enable(&h).unwrap();
        assert_eq!(a.hardware().matrix().mapping(Core::Zero, n), h.vector());
    }

    #[test]
    fn test_shared_residency_must_match() {
        let a = fresh();
        let h1 = unsafe { a.alloc(periph::SPI0, F::SHARED | F::FAST_MEM, Some(nop), ptr::null_mut()) }
            .unwrap();
        let h2 = unsafe { a.alloc(periph::SPI1, F::SHARED, Some(nop), ptr::null_mut()) }.unwrap();
        assert_ne!(h1.vector(), h2.vector());

        // Matching residency joins the existing chain instead.
        let h3 = unsafe { a.alloc(periph::I2C0, F::SHARED | F::FAST_MEM, Some(nop), ptr::null_mut()) }
            .unwrap();
        assert_eq!(h3.vector(), h1.vector());
    }

    #[test]
    fn test_status_filtered_dispatch() {
        static ST1: AtomicU32 = AtomicU32::new(0);
        static ST2: AtomicU32 = AtomicU32::new(0);
        static C1: AtomicUsize = AtomicUsize::new(0);
        static C2: AtomicUsize = AtomicUsize::new(0);

        let a = fresh();
        let h1 = unsafe {
            a.alloc_with_status(
                periph::DMA_CH0,
                F::SHARED,
                StatusCheck::new(ST1.as_ptr(), 1),
                bump,
                counter_arg(&C1),
            )
        }
        .unwrap();
        let h2 = unsafe {
            a.alloc_with_status(
                periph::DMA_CH1,
                F::SHARED,
                StatusCheck::new(ST2.as_ptr(), 1),
                bump,
                counter_arg(&C2),
            )
        }
        .unwrap();
        assert_eq!(h1.vector(), h2.vector());

        ST2.store(1, Ordering::SeqCst);
        unsafe { a.hardware().handlers().invoke(Core::Zero, h1.vector()) };
        assert_eq!(C1.load(Ordering::SeqCst), 0);
        assert_eq!(C2.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_edge_request_gets_edge_vector() {
        let a = fresh();
        let h = unsafe { a.alloc(periph::TG0_T0, F::EDGE, Some(nop), ptr::null_mut()) }.unwrap();
        assert_eq!(vectors::entry(h.vector()).trigger, Trigger::Edge);
    }

    #[test]
    fn test_suspend_resume_non_resident() {
        let a = fresh();
        let fast =
            unsafe { a.alloc(periph::UART0, F::FAST_MEM, Some(nop), ptr::null_mut()) }.unwrap();
        let slow = unsafe { a.alloc(periph::UART1, F::empty(), Some(nop), ptr::null_mut()) }.unwrap();
        let ctl = a.hardware().control();
        assert!(ctl.is_enabled(Core::Zero, fast.vector()));
        assert!(ctl.is_enabled(Core::Zero, slow.vector()));

        a.suspend_non_resident().unwrap();
        assert!(ctl.is_enabled(Core::Zero, fast.vector()));
        assert!(!ctl.is_enabled(Core::Zero, slow.vector()));
        assert!(matches!(a.suspend_non_resident(), Err(IntrError::InUse)));

        a.resume_non_resident().unwrap();
        assert!(ctl.is_enabled(Core::Zero, slow.vector()));
        assert!(matches!(
            a.resume_non_resident(),
            Err(IntrError::NotSuspended)
        ));
    }

    #[test]
    fn test_invalid_requests() {
        let a = fresh();
        assert!(matches!(
            unsafe { a.alloc(periph::UART0, F::SHARED | F::EDGE, Some(nop), ptr::null_mut()) },
            Err(IntrError::InvalidFlags)
        ));
        assert!(matches!(
            unsafe { a.alloc(periph::UART0, F::LEVEL5, Some(nop), ptr::null_mut()) },
            Err(IntrError::InvalidFlags)
        ));
        assert!(matches!(
            unsafe { a.alloc(Source::Peripheral(SOURCE_COUNT as u8), F::empty(), Some(nop), ptr::null_mut()) },
            Err(IntrError::InvalidSource)
        ));
    }

    #[test]
    fn test_concurrent_alloc_free_stress() {
        let a = fresh();
        let mut threads = Vec::new();
        for core_id in 0..2usize {
            threads.push(std::thread::spawn(move || {
                on_core(core_id);
                let base = (core_id * 16) as u8;
                for _round in 0..50 {
                    let mut handles = Vec::new();
                    for i in 0..8u8 {
                        let source = Source::Peripheral(base + i);
                        let flags = if i % 2 == 0 { F::SHARED } else { F::empty() };
                        let h = unsafe { a.alloc(source, flags, Some(nop), ptr::null_mut()) }
                            .unwrap();
                        handles.push(h);
                        a.check_invariants();
                    }
                    for h in handles {
                        a.free(h).unwrap();
                        a.check_invariants();
                    }
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
    }
}
