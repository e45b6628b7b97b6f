//! Per-thread pairing of critical begin and end calls.
//!
//! Every thread that performs an intercepted call owns one [`CallState`]. The state
//! machine has three states:
//!
//! | State | Depth | Pending event |
//! |-------|-------|---------------|
//! | Idle | 0 | none |
//! | Tracking | 1 | the outermost call's event, if it could be started |
//! | Nested | ≥ 2 | still the outermost call's event |
//!
//! Only the outermost begin/end pair of a nested burst produces an event. Inner calls
//! are forwarded unchanged with the caller's own `isCopy` pointer.
//!
//! # Reentrancy
//!
//! The emitter calls back into Java, which may itself perform critical calls and
//! re-enter the interceptor on the same thread. The state is therefore built from
//! [`Cell`]s and no borrow is held across the emitter or the forwarded runtime call.
//! The depth is incremented before the event is started and decremented only after
//! it was finished, so re-entrant calls always observe a nested state.

use std::cell::Cell;

use tracing::{trace, warn};

use crate::{
    emitter::EventEmitter,
    schema::Operation,
    sys::jni::{jboolean, JNI_FALSE},
};

/// Where the outermost call's `isCopy` flag is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopySlot {
    /// The caller passed `NULL`; the flag goes to the thread's scratch slot.
    Scratch,
    /// The caller's own `isCopy` pointer.
    Caller(*mut jboolean),
}

/// Correlator state of one thread.
///
/// `E` is the emitter's event handle. The state is neither `Send` nor `Sync` in
/// spirit: it lives in a `thread_local!` and is only touched by its own thread.
pub struct CallState<E: Copy> {
    depth: Cell<u32>,
    pending: Cell<Option<E>>,
    slot: Cell<CopySlot>,
    scratch: Cell<jboolean>,
}

impl<E: Copy> Default for CallState<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Copy> CallState<E> {
    /// Creates an idle state.
    #[must_use]
    pub const fn new() -> Self {
        CallState {
            depth: Cell::new(0),
            pending: Cell::new(None),
            slot: Cell::new(CopySlot::Scratch),
            scratch: Cell::new(JNI_FALSE),
        }
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// Returns true while the outermost call's event is in flight.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.get().is_some()
    }

    /// The slot chosen for the most recent outermost call.
    #[must_use]
    pub fn slot(&self) -> CopySlot {
        self.slot.get()
    }

    fn slot_ptr(&self, slot: CopySlot) -> *mut jboolean {
        match slot {
            CopySlot::Scratch => self.scratch.as_ptr(),
            CopySlot::Caller(ptr) => ptr,
        }
    }

    /// Handles a "begin critical access" call.
    ///
    /// `forward` invokes the original runtime function with the `isCopy` pointer it
    /// is given. For an outermost call that pointer is the caller's, or the thread's
    /// scratch slot if the caller passed `NULL`, so a copy flag is always observed.
    /// Nested calls forward `caller_slot` untouched and start no event.
    pub fn begin<M, R>(
        &self,
        emitter: &M,
        operation: Operation,
        caller_slot: *mut jboolean,
        forward: impl FnOnce(*mut jboolean) -> R,
    ) -> R
    where
        M: EventEmitter<Event = E>,
    {
        let depth = self.depth.get().saturating_add(1);
        self.depth.set(depth);
        if depth > 1 {
            trace!(%operation, depth, "nested critical call");
            return forward(caller_slot);
        }

        let slot = if caller_slot.is_null() {
            CopySlot::Scratch
        } else {
            CopySlot::Caller(caller_slot)
        };
        self.slot.set(slot);
        self.scratch.set(JNI_FALSE);

        match emitter.start(operation) {
            Ok(event) => self.pending.set(Some(event)),
            Err(e) => {
                warn!(%operation, error = %e, "failed to start event");
                self.pending.set(None);
            }
        }

        trace!(%operation, depth, ?slot, "outermost critical call");
        let result = forward(self.slot_ptr(slot));

        // Snapshot the flag now; the caller's variable may be gone by release time.
        if let CopySlot::Caller(ptr) = slot {
            // SAFETY: the runtime has just written the flag through this pointer.
            self.scratch.set(unsafe { *ptr });
        }
        result
    }

    /// Handles the "end critical access" call matching a previous [`begin`](Self::begin).
    ///
    /// `release` always runs first. At depth 1 the pending event is finished with the
    /// observed copy flag. Emission failures are logged and swallowed.
    pub fn end<M>(&self, emitter: &M, release: impl FnOnce())
    where
        M: EventEmitter<Event = E>,
    {
        release();

        match self.depth.get() {
            0 => warn!("critical release without a matching acquire"),
            1 => {
                let copied = self.scratch.get() != JNI_FALSE;
                if let Some(event) = self.pending.take() {
                    if let Err(e) = emitter.finish(event, copied) {
                        warn!(copied, error = %e, "failed to commit event");
                    }
                }
                trace!(copied, "outermost critical release");
                self.depth.set(self.depth.get().saturating_sub(1));
            }
            depth => {
                trace!(depth, "nested critical release");
                self.depth.set(depth - 1);
            }
        }
    }

    /// Undoes a [`begin`](Self::begin) whose forwarded call failed.
    ///
    /// A critical function that returns `NULL` has thrown, and the caller will not
    /// release it. The depth is restored and, for an outermost call, the pending
    /// event is discarded without being committed.
    pub fn cancel<M>(&self, emitter: &M)
    where
        M: EventEmitter<Event = E>,
    {
        match self.depth.get() {
            0 => {}
            1 => {
                if let Some(event) = self.pending.take() {
                    emitter.discard(event);
                }
                trace!("outermost critical call failed");
                self.depth.set(0);
            }
            depth => self.depth.set(depth - 1),
        }
    }
}
