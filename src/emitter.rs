//! Creation and commit of individual events.
//!
//! The correlator decides *when* an event starts and ends; an [`EventEmitter`] knows
//! *how*. [`FactoryEmitter`] is the live implementation that drives the cached
//! `jdk.jfr.Event` handles of an [`EventFactoryHandle`].
//!
//! Emission errors are returned as [`Error::Emission`] and never turned into Java
//! exceptions; the caller logs them and carries on with the instrumented call.
//!
//! `Release*Critical` may legally be called with an application exception pending.
//! No Java method may run in that state, so the event is dropped instead and the
//! exception is left for the application to see.

use tracing::trace;

use crate::{
    host::{Host, JValue},
    schema::{EventFactoryHandle, Operation},
    Error, Result,
};

/// Starts and finishes events for the outermost critical call of a thread.
pub trait EventEmitter {
    /// Handle to a started event, kept in thread-local state between the begin
    /// and end call.
    type Event: Copy;

    /// Creates an event tagged with `operation` and starts its duration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emission`] if the event cannot be created or started; no
    /// handle needs to be cleaned up in that case.
    fn start(&self, operation: Operation) -> Result<Self::Event>;

    /// Records `copied` on a started event and commits it.
    ///
    /// The handle is consumed whether or not the commit succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Emission`] if the field cannot be set or the commit throws.
    fn finish(&self, event: Self::Event, copied: bool) -> Result<()>;

    /// Drops a started event without committing it.
    fn discard(&self, event: Self::Event);
}

/// Emits events through a registered `jdk.jfr.EventFactory`.
///
/// Events live in a *global* reference between [`EventEmitter::start`] and
/// [`EventEmitter::finish`], since the JNI local frame of the begin call may be
/// gone by the time the matching release arrives.
pub struct FactoryEmitter<'a, H: Host> {
    host: &'a H,
    handle: &'a EventFactoryHandle<H>,
}

impl<'a, H: Host> FactoryEmitter<'a, H> {
    /// Creates an emitter for the current thread's `host`.
    #[must_use]
    pub fn new(host: &'a H, handle: &'a EventFactoryHandle<H>) -> Self {
        FactoryEmitter { host, handle }
    }

    fn ensure_no_exception(&self) -> Result<()> {
        if self.host.exception_pending() {
            return Err(Error::Emission("an application exception is pending".to_string()));
        }
        Ok(())
    }

    fn populate(&self, event: H::Ref, operation: Operation) -> Result<H::Ref> {
        let handle = self.handle;
        self.host.call_void_method(
            event,
            handle.set,
            &[
                JValue::Int(handle.operation_index),
                JValue::Object(handle.label(operation)),
            ],
        )?;
        self.host.call_void_method(event, handle.begin, &[])?;
        self.host.new_global_ref(event)
    }
}

impl<H: Host> EventEmitter for FactoryEmitter<'_, H> {
    type Event = H::Ref;

    fn start(&self, operation: Operation) -> Result<H::Ref> {
        self.ensure_no_exception()?;
        let local = self
            .host
            .call_object_method(self.handle.factory, self.handle.new_event, &[])
            .map_err(Error::into_emission)?;
        let started = self.populate(local, operation);
        self.host.delete_local_ref(local);

        trace!(%operation, "event started");
        started.map_err(Error::into_emission)
    }

    fn finish(&self, event: H::Ref, copied: bool) -> Result<()> {
        if let Err(e) = self.ensure_no_exception() {
            self.host.delete_global_ref(event);
            return Err(e);
        }
        let handle = self.handle;
        let committed = self
            .host
            .call_void_method(
                event,
                handle.set,
                &[
                    JValue::Int(handle.copied_index),
                    JValue::Object(handle.boolean(copied)),
                ],
            )
            .and_then(|()| self.host.call_void_method(event, handle.commit, &[]));
        self.host.delete_global_ref(event);

        trace!(copied, "event committed");
        committed.map_err(Error::into_emission)
    }

    fn discard(&self, event: H::Ref) {
        self.host.delete_global_ref(event);
    }
}
