//! Reflection primitives of the managed runtime.
//!
//! The bootstrap and the event emitter never touch raw JNI directly. They talk to a
//! [`Host`], which exposes exactly the operations they need: resolving classes,
//! methods and static fields, constructing strings, arrays and objects, invoking
//! static and instance methods, and managing local and global references.
//!
//! # Implementations
//!
//! | Type | Description |
//! |------|-------------|
//! | [`JniHost`] | Live implementation over a `JNIEnv` pointer |
//! | `MockHost` | In-memory implementation used by the test suite |
//!
//! # Error Conventions
//!
//! Implementations map failures as follows:
//!
//! - lookups (`find_class`, `*_id`) return [`crate::Error::Lookup`]
//! - constructors (`new_*`, `new_global_ref`) return [`crate::Error::Construction`]
//! - calls that throw return [`crate::Error::Exception`] with the exception cleared
//!
//! # Threading
//!
//! A `Host` is bound to the thread that owns its environment and is therefore not
//! required to be `Send`. The *handles* it produces, however, are stored in the
//! process-wide registry, so [`Host::Ref`] and [`Host::MethodId`] must be
//! `Send + Sync`; only global references may be stored there.

mod jni;
mod jvmti;

pub use jni::{JField, JMethod, JRef, JniHost};
pub use jvmti::Jvmti;
pub(crate) use jvmti::jni_env;

use std::fmt;

use crate::Result;

/// An argument passed to a constructor or method invocation.
///
/// Mirrors the subset of JNI's `jvalue` union that the agent uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JValue<R> {
    /// A reference argument (`L...;` or array)
    Object(R),
    /// An `int` argument
    Int(i32),
    /// A `boolean` argument
    Bool(bool),
}

/// Reflection primitives required from the managed runtime.
///
/// All methods take `&self`: the runtime owns the state and the host is a thin
/// handle to it. Name and signature strings use JNI conventions: binary class
/// names with `/` separators (`java/util/List`) and method descriptors such as
/// `(ILjava/lang/Object;)V`.
pub trait Host {
    /// An object reference (local or global).
    type Ref: Copy + PartialEq + fmt::Debug + Send + Sync;
    /// A resolved method or constructor.
    type MethodId: Copy + fmt::Debug + Send + Sync;
    /// A resolved static field.
    type FieldId: Copy + fmt::Debug;

    /// Resolves a class by its binary name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Lookup`] if the class cannot be found.
    fn find_class(&self, name: &str) -> Result<Self::Ref>;

    /// Resolves an instance method or constructor (`<init>`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Lookup`] if no such method exists.
    fn method_id(&self, class: Self::Ref, name: &str, signature: &str) -> Result<Self::MethodId>;

    /// Resolves a static method.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Lookup`] if no such method exists.
    fn static_method_id(
        &self,
        class: Self::Ref,
        name: &str,
        signature: &str,
    ) -> Result<Self::MethodId>;

    /// Resolves a static field.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Lookup`] if no such field exists.
    fn static_field_id(&self, class: Self::Ref, name: &str, signature: &str)
        -> Result<Self::FieldId>;

    /// Reads a static reference field.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Lookup`] if the field holds `null`.
    fn static_object_field(&self, class: Self::Ref, field: Self::FieldId) -> Result<Self::Ref>;

    /// Creates a `java.lang.String` from UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Construction`] if the string cannot be allocated.
    fn new_string(&self, value: &str) -> Result<Self::Ref>;

    /// Creates an object array of `len` elements, each initially `null`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Construction`] if the array cannot be allocated.
    fn new_object_array(&self, len: usize, element_class: Self::Ref) -> Result<Self::Ref>;

    /// Stores `value` at `index` of an object array.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Construction`] if the index is out of bounds or the
    /// value is not assignable to the element type.
    fn set_object_array_element(
        &self,
        array: Self::Ref,
        index: usize,
        value: Self::Ref,
    ) -> Result<()>;

    /// Invokes a constructor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Construction`] if the object cannot be created.
    fn new_object(
        &self,
        class: Self::Ref,
        constructor: Self::MethodId,
        args: &[JValue<Self::Ref>],
    ) -> Result<Self::Ref>;

    /// Invokes a static method returning a reference.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Exception`] if the method throws.
    fn call_static_object_method(
        &self,
        class: Self::Ref,
        method: Self::MethodId,
        args: &[JValue<Self::Ref>],
    ) -> Result<Self::Ref>;

    /// Invokes an instance method returning a reference.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Exception`] if the method throws.
    fn call_object_method(
        &self,
        object: Self::Ref,
        method: Self::MethodId,
        args: &[JValue<Self::Ref>],
    ) -> Result<Self::Ref>;

    /// Invokes an instance method returning `void`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Exception`] if the method throws.
    fn call_void_method(
        &self,
        object: Self::Ref,
        method: Self::MethodId,
        args: &[JValue<Self::Ref>],
    ) -> Result<()>;

    /// Promotes a reference to a global reference valid on every thread.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Construction`] if the runtime is out of memory.
    fn new_global_ref(&self, object: Self::Ref) -> Result<Self::Ref>;

    /// Releases a local reference.
    fn delete_local_ref(&self, object: Self::Ref);

    /// Releases a global reference.
    fn delete_global_ref(&self, object: Self::Ref);

    /// Returns true if an exception is pending on the current thread.
    ///
    /// The exception is left in place. While one is pending only reference deletion
    /// is permitted; no other method of this trait may be called.
    fn exception_pending(&self) -> bool;
}
