//! # Shared-Vector Dispatch
//!
//! Exclusive vectors bind the caller's handler straight into the raw
//! dispatch table. Shared vectors bind a trampoline instead, whose
//! argument is a per-vector context pointing back at the allocator; the
//! trampoline walks the registration chain under the allocator lock, so
//! enabling or disabling an entry is atomic with respect to dispatch.

use lattice_hal::Core;

use crate::allocator::InterruptAllocator;

/// Context bound as the trampoline argument of one shared vector.
///
/// Boxed when the vector becomes shared, reclaimed when the last entry
/// unlinks.
pub(crate) struct SharedCtx {
    pub alloc: *const InterruptAllocator,
    pub core: Core,
    pub vector: u8,
}

/// Trampoline installed in the raw dispatch table for shared vectors.
pub(crate) fn shared_trampoline(arg: *mut ()) {
    // SAFETY: `arg` is the SharedCtx leaked while this vector stays
    // shared, and the allocator it points at is 'static.
    let ctx = unsafe { &*(arg as *const SharedCtx) };
    let alloc = unsafe { &*ctx.alloc };
    alloc.dispatch_shared(ctx.core, ctx.vector);
}
