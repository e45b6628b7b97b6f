//! Thin wrapper over a JVMTI environment.

use std::{
    ffi::{c_void, CStr},
    ptr,
};

use crate::{
    sys::{
        jni::{jint, JNIEnv, JavaVM, JNINativeInterface_, JNI_OK},
        jvmti::{
            jvmtiEnv, jvmtiError, jvmtiEvent, jvmtiEventCallbacks, JVMTI_ENABLE,
            JVMTI_ERROR_NONE,
        },
    },
    Error, Result,
};

/// A JVMTI environment.
///
/// Wraps the `jvmtiEnv*` returned by `JavaVM::GetEnv` or handed to event callbacks
/// and turns every non-zero `jvmtiError` into [`Error::Jvmti`].
pub struct Jvmti {
    env: *mut jvmtiEnv,
}

impl Jvmti {
    /// Wraps a raw JVMTI environment.
    ///
    /// # Safety
    ///
    /// `env` must be a valid JVMTI environment for the lifetime of the wrapper.
    #[must_use]
    pub unsafe fn from_raw(env: *mut jvmtiEnv) -> Self {
        Jvmti { env }
    }

    /// Obtains a JVMTI environment of the given version from the VM.
    ///
    /// # Safety
    ///
    /// `vm` must be the valid `JavaVM` passed to an agent entry point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Jni`] if the VM does not support the requested version.
    pub unsafe fn from_vm(vm: *mut JavaVM, version: jint) -> Result<Self> {
        get_env(vm, version, "GetEnv").map(|env| Jvmti {
            env: env.cast::<jvmtiEnv>(),
        })
    }

    fn check(&self, code: jvmtiError, context: &'static str) -> Result<()> {
        if code == JVMTI_ERROR_NONE {
            Ok(())
        } else {
            Err(Error::Jvmti { code, context })
        }
    }

    fn function<F>(&self, slot: Option<F>, context: &'static str) -> Result<F> {
        slot.ok_or_else(|| lookup_error!("JVMTI function {} is not available", context))
    }

    fn interface(&self) -> &crate::sys::jvmti::jvmtiInterface_1_ {
        // SAFETY: `from_raw`/`from_vm` guarantee a valid environment.
        unsafe { &**self.env }
    }

    /// Returns a freshly allocated copy of the current JNI function table.
    ///
    /// Each call returns a distinct copy owned by the caller, to be released with
    /// [`Jvmti::deallocate`] once no longer referenced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Jvmti`] if JVMTI refuses the request.
    pub fn jni_function_table(&self) -> Result<*mut JNINativeInterface_> {
        let get = self.function(self.interface().GetJNIFunctionTable, "GetJNIFunctionTable")?;
        let mut table: *mut JNINativeInterface_ = ptr::null_mut();
        // SAFETY: valid environment and out-pointer.
        let code = unsafe { get(self.env, &mut table) };
        self.check(code, "GetJNIFunctionTable")?;
        if table.is_null() {
            return Err(Error::Redirection(
                "GetJNIFunctionTable returned a null table".to_string(),
            ));
        }
        Ok(table)
    }

    /// Installs `table` as the JNI function table of every current and future
    /// `JNIEnv`. The VM copies the table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Jvmti`] if JVMTI refuses the table.
    pub fn set_jni_function_table(&self, table: *const JNINativeInterface_) -> Result<()> {
        let set = self.function(self.interface().SetJNIFunctionTable, "SetJNIFunctionTable")?;
        // SAFETY: valid environment; the table is a complete JNINativeInterface_.
        let code = unsafe { set(self.env, table) };
        self.check(code, "SetJNIFunctionTable")
    }

    /// Releases memory allocated by JVMTI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Jvmti`] if JVMTI rejects the pointer.
    pub fn deallocate(&self, memory: *mut c_void) -> Result<()> {
        let deallocate = self.function(self.interface().Deallocate, "Deallocate")?;
        // SAFETY: `memory` was allocated by this JVMTI environment.
        let code = unsafe { deallocate(self.env, memory.cast()) };
        self.check(code, "Deallocate")
    }

    /// Registers the event callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Jvmti`] if JVMTI rejects the callbacks.
    pub fn set_event_callbacks(&self, callbacks: &jvmtiEventCallbacks) -> Result<()> {
        let set = self.function(self.interface().SetEventCallbacks, "SetEventCallbacks")?;
        let size = std::mem::size_of::<jvmtiEventCallbacks>() as jint;
        // SAFETY: valid environment, `size` matches the structure passed.
        let code = unsafe { set(self.env, callbacks, size) };
        self.check(code, "SetEventCallbacks")
    }

    /// Enables delivery of `event` for all threads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Jvmti`] if the event cannot be enabled in the current phase.
    pub fn enable_event(&self, event: jvmtiEvent) -> Result<()> {
        let set = self.function(
            self.interface().SetEventNotificationMode,
            "SetEventNotificationMode",
        )?;
        // SAFETY: valid environment; a null thread selects all threads.
        let code = unsafe { set(self.env, JVMTI_ENABLE, event, ptr::null_mut()) };
        self.check(code, "SetEventNotificationMode")
    }

    /// Returns the symbolic name of a JVMTI error code, if the VM provides one.
    #[must_use]
    pub fn error_name(&self, code: jvmtiError) -> Option<String> {
        let get = self.interface().GetErrorName?;
        let mut name = ptr::null_mut();
        // SAFETY: valid environment and out-pointer.
        if unsafe { get(self.env, code, &mut name) } != JVMTI_ERROR_NONE || name.is_null() {
            return None;
        }
        // SAFETY: JVMTI returns a NUL-terminated string it allocated.
        let text = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
        let _ = self.deallocate(name.cast());
        Some(text)
    }
}

/// Calls `JavaVM::GetEnv` for the given interface version.
///
/// # Safety
///
/// `vm` must be the valid `JavaVM` passed to an agent entry point.
pub(crate) unsafe fn get_env(
    vm: *mut JavaVM,
    version: jint,
    context: &'static str,
) -> Result<*mut c_void> {
    if vm.is_null() || (*vm).is_null() {
        return Err(Error::Jni { code: -1, context });
    }
    let Some(get_env) = (**vm).GetEnv else {
        return Err(lookup_error!("JavaVM function GetEnv is not available"));
    };
    let mut env: *mut c_void = ptr::null_mut();
    let code = get_env(vm, &mut env, version);
    if code != JNI_OK || env.is_null() {
        return Err(Error::Jni { code, context });
    }
    Ok(env)
}

/// Obtains the `JNIEnv` of the current thread from the VM.
///
/// # Safety
///
/// `vm` must be the valid `JavaVM` passed to an agent entry point, and the calling
/// thread must be attached to it.
pub(crate) unsafe fn jni_env(vm: *mut JavaVM, version: jint) -> Result<*mut JNIEnv> {
    get_env(vm, version, "GetEnv").map(|env| env.cast::<JNIEnv>())
}
