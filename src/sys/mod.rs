//! Raw FFI bindings.
//!
//! The JNI types and the `JNINativeInterface_` function table come from the
//! [`jni_sys`] crate and are re-exported as [`jni`]. JVMTI is not covered by that
//! crate, so [`jvmti`] declares the subset of the JVMTI interface this agent calls,
//! with the remaining slots kept as opaque padding so the layout matches `jvmti.h`.

pub use jni_sys as jni;

pub mod jvmti;
