//! Redirection of the JNI critical functions.
//!
//! [`install`] fetches the live JNI function table twice through JVMTI. The first
//! copy is published as the *original* table and never modified; the second copy has
//! exactly four entries replaced and is installed as the active table:
//!
//! | Entry | Replacement |
//! |-------|-------------|
//! | `GetStringCritical` | begins tracking, forwards |
//! | `ReleaseStringCritical` | forwards, ends tracking |
//! | `GetPrimitiveArrayCritical` | begins tracking, forwards |
//! | `ReleasePrimitiveArrayCritical` | forwards, ends tracking |
//!
//! The replacements always forward through the original table, so they keep working
//! after the active table has been swapped. Until the event schema is available they
//! forward untracked.

use std::{
    ffi::c_void,
    ptr::{self, NonNull},
    sync::OnceLock,
};

use tracing::{debug, info};

use crate::{
    agent::registry,
    correlator::CallState,
    emitter::FactoryEmitter,
    host::{JRef, JniHost, Jvmti},
    schema::Operation,
    sys::jni::{jarray, jboolean, jchar, jint, jstring, JNIEnv, JNINativeInterface_},
    Error, Result,
};

/// The JNI function table as it was before redirection.
struct OriginalTable(NonNull<JNINativeInterface_>);

// SAFETY: the table is published once, never written afterwards and never freed.
unsafe impl Send for OriginalTable {}
unsafe impl Sync for OriginalTable {}

static ORIGINAL: OnceLock<OriginalTable> = OnceLock::new();

thread_local! {
    static CALL_STATE: CallState<JRef> = const { CallState::new() };
}

fn original() -> Option<&'static JNINativeInterface_> {
    // SAFETY: see `OriginalTable`.
    ORIGINAL.get().map(|table| unsafe { table.0.as_ref() })
}

fn publish_original(table: *mut JNINativeInterface_) -> Result<()> {
    let table = NonNull::new(table)
        .ok_or_else(|| Error::Redirection("original JNI function table is null".to_string()))?;
    ORIGINAL
        .set(OriginalTable(table))
        .map_err(|_| Error::AlreadyInstalled)
}

/// Installs the redirection of the JNI critical functions.
///
/// Must run at most once per process; [`Registry::redirect`](crate::agent::Registry::redirect)
/// guarantees that. A failure part-way is not rolled back.
///
/// # Errors
///
/// Returns [`Error::Redirection`] if the table cannot be fetched or installed, or
/// [`Error::AlreadyInstalled`] if an original table was already published.
pub fn install(jvmti: &Jvmti) -> Result<()> {
    let original = jvmti.jni_function_table().map_err(Error::into_redirection)?;
    if let Err(e) = publish_original(original) {
        let _ = jvmti.deallocate(original.cast());
        return Err(e);
    }

    let replacement = jvmti.jni_function_table().map_err(Error::into_redirection)?;
    // SAFETY: `replacement` is a fresh copy owned by this agent until deallocated.
    redirect(unsafe { &mut *replacement });
    let installed = jvmti.set_jni_function_table(replacement);
    // SetJNIFunctionTable copies the table.
    if let Err(e) = jvmti.deallocate(replacement.cast()) {
        debug!(error = %e, "failed to deallocate the replacement JNI table");
    }
    installed.map_err(Error::into_redirection)?;

    info!("JNI critical functions redirected");
    Ok(())
}

/// Overwrites the four critical entries of `table` with the tracking wrappers.
///
/// Every other entry is left untouched.
pub fn redirect(table: &mut JNINativeInterface_) {
    table.GetStringCritical = Some(get_string_critical);
    table.ReleaseStringCritical = Some(release_string_critical);
    table.GetPrimitiveArrayCritical = Some(get_primitive_array_critical);
    table.ReleasePrimitiveArrayCritical = Some(release_primitive_array_critical);
}

/// Something that can install the JNI function table redirection.
///
/// The lifecycle code depends on this trait rather than on [`Jvmti`] directly so
/// that the startup and attach flows can be exercised without a VM.
pub trait Redirector {
    /// Installs the redirection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Redirection`] if the redirection cannot be installed.
    fn install_redirection(&self) -> Result<()>;
}

impl Redirector for Jvmti {
    fn install_redirection(&self) -> Result<()> {
        install(self)
    }
}

/// Runs `f` with an emitter for `env` and the current thread's state.
///
/// Returns `None` without calling `f` while the event schema is absent or the
/// thread's local storage is being torn down.
fn tracked<R>(
    env: *mut JNIEnv,
    f: impl FnOnce(&FactoryEmitter<'_, JniHost>, &CallState<JRef>) -> R,
) -> Option<R> {
    let handle = registry().events()?;
    // SAFETY: `env` is the calling thread's environment, passed to the intercepted function.
    let host = unsafe { JniHost::from_raw(env) };
    let emitter = FactoryEmitter::new(&host, handle);
    CALL_STATE.try_with(|state| f(&emitter, state)).ok()
}

unsafe extern "system" fn get_string_critical(
    env: *mut JNIEnv,
    string: jstring,
    is_copy: *mut jboolean,
) -> *const jchar {
    let Some(forward) = original().and_then(|table| table.GetStringCritical) else {
        return ptr::null();
    };
    tracked(env, |emitter, state| {
        let chars = state.begin(emitter, Operation::GetStringCritical, is_copy, |slot| {
            forward(env, string, slot)
        });
        if chars.is_null() {
            state.cancel(emitter);
        }
        chars
    })
    .unwrap_or_else(|| forward(env, string, is_copy))
}

unsafe extern "system" fn release_string_critical(
    env: *mut JNIEnv,
    string: jstring,
    chars: *const jchar,
) {
    let Some(release) = original().and_then(|table| table.ReleaseStringCritical) else {
        return;
    };
    tracked(env, |emitter, state| {
        state.end(emitter, || release(env, string, chars));
    })
    .unwrap_or_else(|| release(env, string, chars));
}

unsafe extern "system" fn get_primitive_array_critical(
    env: *mut JNIEnv,
    array: jarray,
    is_copy: *mut jboolean,
) -> *mut c_void {
    let Some(forward) = original().and_then(|table| table.GetPrimitiveArrayCritical) else {
        return ptr::null_mut();
    };
    tracked(env, |emitter, state| {
        let elements = state.begin(emitter, Operation::GetPrimitiveArrayCritical, is_copy, |slot| {
            forward(env, array, slot)
        });
        if elements.is_null() {
            state.cancel(emitter);
        }
        elements
    })
    .unwrap_or_else(|| forward(env, array, is_copy))
}

unsafe extern "system" fn release_primitive_array_critical(
    env: *mut JNIEnv,
    array: jarray,
    elements: *mut c_void,
    mode: jint,
) {
    let Some(release) = original().and_then(|table| table.ReleasePrimitiveArrayCritical) else {
        return;
    };
    tracked(env, |emitter, state| {
        state.end(emitter, || release(env, array, elements, mode));
    })
    .unwrap_or_else(|| release(env, array, elements, mode));
}
