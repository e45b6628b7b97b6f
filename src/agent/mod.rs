//! Agent lifecycle.
//!
//! The JVM drives the agent through three exported entry points:
//!
//! | Entry point | When | What runs |
//! |-------------|------|-----------|
//! | `Agent_OnLoad` | `-agentpath:` at startup | registers a `VMStart` callback that bootstraps the schema, then redirects |
//! | `Agent_OnAttach` | dynamic attach to a live VM | bootstraps the schema if needed (see [`AttachPolicy`]), then redirects |
//! | `Agent_OnUnload` | VM shutdown | nothing; see below |
//!
//! All process-wide state lives in a [`Registry`]: the schema handles, published at
//! most once, and a guard that lets the JNI table be redirected at most once. Both are
//! written during a single-threaded startup callback and are read-only afterwards, so
//! the hot path takes no lock.
//!
//! # Failure Policy
//!
//! A failing bootstrap or redirection disables the agent and is reported on standard
//! error. It never aborts the VM. Redirection requires a bootstrapped schema, so a
//! failed bootstrap also means the JNI table is never touched.
//!
//! # Unload
//!
//! The cached global references and the original JNI table are kept until the
//! process exits. The redirected table may still be in use by VM threads during
//! shutdown, and no `JNIEnv` is available to delete global references at that point.

mod entry;
pub mod logging;
mod options;

pub use entry::{Agent_OnAttach, Agent_OnLoad, Agent_OnUnload};
pub use options::{AgentOptions, AttachPolicy};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    OnceLock,
};

use tracing::{error, info};

use crate::{
    host::{Host, JniHost},
    interceptor::Redirector,
    schema::{critical_event, EventFactoryHandle, SchemaBuilder},
    Error, Result,
};

static REGISTRY: Registry<JniHost> = Registry::new();

/// The registry of the running agent.
#[must_use]
pub fn registry() -> &'static Registry<JniHost> {
    &REGISTRY
}

/// Process-wide, immutable-after-init agent state.
pub struct Registry<H: Host> {
    events: OnceLock<EventFactoryHandle<H>>,
    redirected: AtomicBool,
}

impl<H: Host> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> Registry<H> {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Registry {
            events: OnceLock::new(),
            redirected: AtomicBool::new(false),
        }
    }

    /// The schema handles, once bootstrapped.
    #[must_use]
    pub fn events(&self) -> Option<&EventFactoryHandle<H>> {
        self.events.get()
    }

    /// Returns true once the redirection has been attempted.
    #[must_use]
    pub fn is_redirected(&self) -> bool {
        self.redirected.load(Ordering::Acquire)
    }

    /// Registers the critical event type and publishes its handles.
    ///
    /// Returns the existing handles if the schema is already bootstrapped. Nothing is
    /// published if the build fails.
    ///
    /// # Errors
    ///
    /// Returns the bootstrap error of [`SchemaBuilder::build`].
    pub fn bootstrap(&self, host: &H) -> Result<&EventFactoryHandle<H>> {
        if let Some(events) = self.events.get() {
            return Ok(events);
        }

        let handle = SchemaBuilder::new(host).build(&critical_event())?;
        self.publish(host, handle)
    }

    /// Publishes built handles. If handles were already published, `handle` is
    /// released and the existing ones are returned.
    pub(crate) fn publish(
        &self,
        host: &H,
        handle: EventFactoryHandle<H>,
    ) -> Result<&EventFactoryHandle<H>> {
        if let Err(duplicate) = self.events.set(handle) {
            duplicate.release(host);
        }
        self.events.get().ok_or(Error::NotBootstrapped)
    }

    /// Installs the JNI table redirection, at most once per registry.
    ///
    /// A redirection that fails part-way is not retried.
    ///
    /// # Errors
    ///
    /// - [`Error::NotBootstrapped`] if the schema has not been bootstrapped
    /// - [`Error::AlreadyInstalled`] on every call after the first
    /// - the redirector's error otherwise
    pub fn redirect<R: Redirector + ?Sized>(&self, redirector: &R) -> Result<()> {
        if self.events.get().is_none() {
            return Err(Error::NotBootstrapped);
        }
        if self.redirected.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyInstalled);
        }
        redirector.install_redirection()
    }
}

/// The `VMStart` flow: bootstrap, then redirect.
///
/// # Errors
///
/// Returns the first failing step's error; a failed bootstrap skips the redirection.
pub fn on_vm_start<H, R>(registry: &Registry<H>, host: &H, redirector: &R) -> Result<()>
where
    H: Host,
    R: Redirector + ?Sized,
{
    registry.bootstrap(host)?;
    registry.redirect(redirector)
}

/// The late-attach flow.
///
/// # Errors
///
/// Returns [`Error::NotBootstrapped`] under [`AttachPolicy::Require`] when the schema
/// is absent, or the first failing step's error.
pub fn on_attach<H, R>(
    registry: &Registry<H>,
    host: &H,
    redirector: &R,
    policy: AttachPolicy,
) -> Result<()>
where
    H: Host,
    R: Redirector + ?Sized,
{
    if registry.events().is_none() {
        match policy {
            AttachPolicy::Bootstrap => {
                registry.bootstrap(host)?;
            }
            AttachPolicy::Require => return Err(Error::NotBootstrapped),
        }
    }
    registry.redirect(redirector)
}

/// Logs the outcome of a lifecycle flow. Returns true if the agent is active.
pub(crate) fn report(phase: &'static str, result: Result<()>) -> bool {
    match result {
        Ok(()) => {
            info!(phase, "JNI critical reporting enabled");
            true
        }
        Err(Error::AlreadyInstalled) => {
            info!(phase, "JNI table redirection was already attempted");
            true
        }
        Err(e) if e.is_bootstrap() => {
            error!(phase, error = %e, "failed to register the JNI critical event; reporting disabled");
            false
        }
        Err(e) => {
            error!(phase, error = %e, "failed to enable JNI critical reporting");
            false
        }
    }
}
