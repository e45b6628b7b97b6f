//! Subset of the JVMTI 11 interface (`jvmti.h`).
//!
//! Only the functions used by the agent are named. Every other slot of the
//! 156-entry `jvmtiInterface_1_` table is reserved as opaque padding; the slot
//! numbers in the comments are the 1-based positions from the JVMTI specification.

#![allow(non_camel_case_types, non_snake_case, missing_docs)]

use std::ffi::{c_char, c_uchar, c_void};

use crate::sys::jni::{jint, jobject, JNIEnv, JNINativeInterface_};

pub type jthread = jobject;

pub type jvmtiError = u32;
pub type jvmtiEventMode = jint;
pub type jvmtiEvent = jint;
pub type jvmtiEnv = *const jvmtiInterface_1_;

pub const JVMTI_VERSION_11: jint = 0x300B_0000;

pub const JVMTI_ERROR_NONE: jvmtiError = 0;

pub const JVMTI_ENABLE: jvmtiEventMode = 1;

pub const JVMTI_EVENT_VM_START: jvmtiEvent = 57;

/* Function types */

/// `SetEventNotificationMode` is declared variadic in `jvmti.h`.
pub type SetEventNotificationModeFn = unsafe extern "C" fn(
    env: *mut jvmtiEnv,
    mode: jvmtiEventMode,
    event_type: jvmtiEvent,
    event_thread: jthread,
    ...
) -> jvmtiError;
pub type DeallocateFn = unsafe extern "system" fn(env: *mut jvmtiEnv, mem: *mut c_uchar) -> jvmtiError;
pub type SetJNIFunctionTableFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    function_table: *const JNINativeInterface_,
) -> jvmtiError;
pub type GetJNIFunctionTableFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    function_table: *mut *mut JNINativeInterface_,
) -> jvmtiError;
pub type SetEventCallbacksFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    callbacks: *const jvmtiEventCallbacks,
    size_of_callbacks: jint,
) -> jvmtiError;
pub type GetErrorNameFn = unsafe extern "system" fn(
    env: *mut jvmtiEnv,
    error: jvmtiError,
    name_ptr: *mut *mut c_char,
) -> jvmtiError;

/* Event callback types */

pub type VMStartFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv);
/// Placeholder for callbacks this agent never registers.
pub type UnusedFn = unsafe extern "system" fn();

#[repr(C)]
pub struct jvmtiInterface_1_ {
    /*   1: RESERVED */
    reserved1: *mut c_void,
    /*   2: Set Event Notification Mode */
    pub SetEventNotificationMode: Option<SetEventNotificationModeFn>,
    /*   3 - 46 */
    reserved3_46: [*mut c_void; 44],
    /*  47: Deallocate */
    pub Deallocate: Option<DeallocateFn>,
    /*  48 - 119 */
    reserved48_119: [*mut c_void; 72],
    /* 120: Set JNI Function Table */
    pub SetJNIFunctionTable: Option<SetJNIFunctionTableFn>,
    /* 121: Get JNI Function Table */
    pub GetJNIFunctionTable: Option<GetJNIFunctionTableFn>,
    /* 122: Set Event Callbacks */
    pub SetEventCallbacks: Option<SetEventCallbacksFn>,
    /* 123 - 127 */
    reserved123_127: [*mut c_void; 5],
    /* 128: Get Error Name */
    pub GetErrorName: Option<GetErrorNameFn>,
    /* 129 - 156 */
    reserved129_156: [*mut c_void; 28],
}

/// Leading prefix of `jvmtiEventCallbacks`, up to and including `VMStart`.
///
/// `SetEventCallbacks` takes the size of the structure and treats the missing
/// trailing callbacks as unset.
#[repr(C)]
#[derive(Default)]
pub struct jvmtiEventCallbacks {
    /* 50 : VM Initialization Event */
    pub VMInit: Option<UnusedFn>,
    /* 51 : VM Death Event */
    pub VMDeath: Option<UnusedFn>,
    /* 52 : Thread Start */
    pub ThreadStart: Option<UnusedFn>,
    /* 53 : Thread End */
    pub ThreadEnd: Option<UnusedFn>,
    /* 54 : Class File Load Hook */
    pub ClassFileLoadHook: Option<UnusedFn>,
    /* 55 : Class Load */
    pub ClassLoad: Option<UnusedFn>,
    /* 56 : Class Prepare */
    pub ClassPrepare: Option<UnusedFn>,
    /* 57 : VM Start Event */
    pub VMStart: Option<VMStartFn>,
}
