//! Exported agent entry points.
//!
//! These are the only symbols the JVM resolves in the shared library. Every entry
//! point parses the options, installs logging and hands off to the lifecycle flows in
//! the parent module. Failures are logged and turned into `JNI_ERR`; nothing here
//! panics across the FFI boundary.

use std::ffi::{c_char, c_void};

use tracing::{debug, error};

use crate::{
    agent::{logging, on_attach, on_vm_start, registry, report, AgentOptions, AttachPolicy},
    host::{jni_env, JniHost, Jvmti},
    sys::{
        jni::{jint, JNIEnv, JavaVM, JNI_ERR, JNI_OK, JNI_VERSION_1_6},
        jvmti::{jvmtiEnv, jvmtiEventCallbacks, JVMTI_EVENT_VM_START, JVMTI_VERSION_11},
    },
    Error, Result,
};

/// Startup entry point for `-agentpath:`.
///
/// Registers the `VMStart` callback. The schema cannot be registered here because
/// no Java code may run before the VM has started.
///
/// # Safety
///
/// Called by the JVM with a valid `JavaVM` and a null or NUL-terminated options
/// string.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn Agent_OnLoad(
    vm: *mut JavaVM,
    options: *mut c_char,
    _reserved: *mut c_void,
) -> jint {
    let Some(options) = configure(options) else {
        return JNI_ERR;
    };

    match load(vm) {
        Ok(()) => {
            debug!(?options, "agent loaded, waiting for VMStart");
            JNI_OK
        }
        Err(e) => {
            error!(error = %e, "failed to load the agent");
            JNI_ERR
        }
    }
}

/// Dynamic attach entry point.
///
/// # Safety
///
/// Called by the JVM on an attached thread with a valid `JavaVM` and a null or
/// NUL-terminated options string.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn Agent_OnAttach(
    vm: *mut JavaVM,
    options: *mut c_char,
    _reserved: *mut c_void,
) -> jint {
    let Some(options) = configure(options) else {
        return JNI_ERR;
    };

    if report("attach", attach(vm, options.attach)) {
        JNI_OK
    } else {
        JNI_ERR
    }
}

/// Shutdown entry point.
///
/// # Safety
///
/// Called by the JVM during shutdown.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn Agent_OnUnload(_vm: *mut JavaVM) {
    debug!(
        redirected = registry().is_redirected(),
        "agent unloaded, cached handles are kept until exit"
    );
}

/// Parses the options and installs logging. Returns `None` if the options are invalid.
unsafe fn configure(options: *const c_char) -> Option<AgentOptions> {
    match AgentOptions::from_raw(options) {
        Ok(options) => {
            logging::init(options.log.as_deref());
            Some(options)
        }
        Err(e) => {
            logging::init(None);
            error!(error = %e, "refusing to start the agent");
            None
        }
    }
}

unsafe fn load(vm: *mut JavaVM) -> Result<()> {
    let jvmti = Jvmti::from_vm(vm, JVMTI_VERSION_11)?;
    let callbacks = jvmtiEventCallbacks {
        VMStart: Some(vm_start),
        ..Default::default()
    };
    let result = jvmti
        .set_event_callbacks(&callbacks)
        .and_then(|()| jvmti.enable_event(JVMTI_EVENT_VM_START));
    if let Err(Error::Jvmti { code, context }) = &result {
        if let Some(name) = jvmti.error_name(*code) {
            debug!(context, code, name = %name, "JVMTI refused the VMStart callback");
        }
    }
    result
}

unsafe fn attach(vm: *mut JavaVM, policy: AttachPolicy) -> Result<()> {
    let jvmti = Jvmti::from_vm(vm, JVMTI_VERSION_11)?;
    let host = JniHost::from_raw(jni_env(vm, JNI_VERSION_1_6)?);
    on_attach(registry(), &host, &jvmti, policy)
}

unsafe extern "system" fn vm_start(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv) {
    let jvmti = Jvmti::from_raw(jvmti_env);
    let host = JniHost::from_raw(jni_env);
    report("VMStart", on_vm_start(registry(), &host, &jvmti));
}
