//! [`Host`] implementation over a live `JNIEnv`.

use std::{ffi::CString, ptr};

use tracing::{debug, Level};

use crate::{
    host::{Host, JValue},
    sys::jni::{
        jfieldID, jmethodID, jobject, jsize, jvalue, JNIEnv, JNINativeInterface_, JNI_FALSE,
        JNI_TRUE,
    },
    Error, Result,
};

/// Maximum number of arguments marshalled for a single call.
///
/// `List.of` has fixed-arity overloads up to ten elements; nothing else the agent
/// calls takes more than four.
const MAX_ARGS: usize = 10;

/// Resolves a JNI function from the environment's function table.
///
/// Returns `Error::Lookup` from the enclosing function if the slot is empty.
macro_rules! jni_fn {
    ($table:expr, $name:ident) => {
        match $table.$name {
            Some(function) => function,
            None => {
                return Err(lookup_error!(concat!(
                    "JNI function ",
                    stringify!($name),
                    " is not available"
                )))
            }
        }
    };
}

/// An opaque JVM object reference.
///
/// # Thread Safety
///
/// Local references are only valid on the thread that created them, global
/// references on every thread. The type is `Send + Sync` so global references can
/// live in the process-wide registry; keeping local references thread-confined is
/// the responsibility of the code holding them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JRef(jobject);

// SAFETY: see the type-level documentation. The pointer is an opaque handle that
// is never dereferenced on the Rust side.
unsafe impl Send for JRef {}
unsafe impl Sync for JRef {}

impl JRef {
    /// Wraps a raw `jobject`.
    #[must_use]
    pub fn from_raw(raw: jobject) -> Self {
        JRef(raw)
    }

    /// Returns the raw `jobject`.
    #[must_use]
    pub fn as_raw(self) -> jobject {
        self.0
    }

    /// Returns true if this is the `null` reference.
    #[must_use]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// A resolved method id.
///
/// Method ids stay valid on every thread for as long as the declaring class is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JMethod(jmethodID);

// SAFETY: method ids are process-wide identifiers, valid from any attached thread.
unsafe impl Send for JMethod {}
unsafe impl Sync for JMethod {}

impl JMethod {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: jmethodID) -> Self {
        JMethod(raw)
    }
}

/// A resolved static field id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JField(jfieldID);

/// Reflection over the JNI environment of the current thread.
///
/// Every failing call checks for a pending Java exception, clears it (describing it
/// first when `debug` logging is enabled) and returns an [`Error`].
///
/// # Examples
///
/// ```rust,ignore
/// let host = unsafe { JniHost::from_raw(jni_env) };
/// let list = host.find_class("java/util/List")?;
/// ```
pub struct JniHost {
    env: *mut JNIEnv,
}

impl JniHost {
    /// Wraps the `JNIEnv` handed to a JVMTI callback or obtained from `GetEnv`.
    ///
    /// # Safety
    ///
    /// `env` must be a valid `JNIEnv` of the current thread and must stay valid for
    /// the lifetime of the returned host.
    #[must_use]
    pub unsafe fn from_raw(env: *mut JNIEnv) -> Self {
        JniHost { env }
    }

    fn table(&self) -> &JNINativeInterface_ {
        // SAFETY: `from_raw` requires a valid environment, whose first word points to
        // the (possibly redirected) function table for the lifetime of the VM.
        unsafe { &**self.env }
    }

    /// Clears a pending exception. Returns true if one was pending.
    fn clear_exception(&self) -> bool {
        let table = self.table();
        let (Some(check), Some(clear)) = (table.ExceptionCheck, table.ExceptionClear) else {
            return false;
        };
        // SAFETY: valid environment per `from_raw`.
        unsafe {
            if check(self.env) != JNI_TRUE {
                return false;
            }
            if tracing::enabled!(Level::DEBUG) {
                if let Some(describe) = table.ExceptionDescribe {
                    // ExceptionDescribe prints to stderr and clears the exception.
                    describe(self.env);
                }
            }
            clear(self.env);
        }
        true
    }

    /// Converts a possibly-null result into a `Result`, clearing any pending exception.
    fn checked(&self, raw: jobject, on_null: impl FnOnce() -> Error) -> Result<JRef> {
        if self.clear_exception() || raw.is_null() {
            return Err(on_null());
        }
        Ok(JRef(raw))
    }

    fn c_string(value: &str) -> Result<CString> {
        CString::new(value)
            .map_err(|_| construction_error!("{:?} contains an interior NUL byte", value))
    }

    fn marshal(args: &[JValue<JRef>]) -> Result<[jvalue; MAX_ARGS]> {
        if args.len() > MAX_ARGS {
            return Err(construction_error!(
                "{} arguments exceed the supported maximum of {}",
                args.len(),
                MAX_ARGS
            ));
        }

        let mut raw = [jvalue { j: 0 }; MAX_ARGS];
        for (slot, arg) in raw.iter_mut().zip(args) {
            *slot = match *arg {
                JValue::Object(object) => jvalue { l: object.0 },
                JValue::Int(i) => jvalue { i },
                JValue::Bool(z) => jvalue {
                    z: if z { JNI_TRUE } else { JNI_FALSE },
                },
            };
        }
        Ok(raw)
    }

    fn lookup_member(
        &self,
        class: JRef,
        name: &str,
        signature: &str,
        is_static: bool,
    ) -> Result<jmethodID> {
        let c_name = Self::c_string(name)?;
        let c_signature = Self::c_string(signature)?;
        let table = self.table();
        let lookup = if is_static {
            jni_fn!(table, GetStaticMethodID)
        } else {
            jni_fn!(table, GetMethodID)
        };

        // SAFETY: valid environment, class reference obtained from this host.
        let method = unsafe {
            lookup(self.env, class.0, c_name.as_ptr(), c_signature.as_ptr())
        };
        if self.clear_exception() || method.is_null() {
            let kind = if is_static {
                "GetStaticMethodID"
            } else {
                "GetMethodID"
            };
            return Err(lookup_error!("{}({}{}) failed", kind, name, signature));
        }
        Ok(method)
    }
}

impl Host for JniHost {
    type Ref = JRef;
    type MethodId = JMethod;
    type FieldId = JField;

    fn find_class(&self, name: &str) -> Result<JRef> {
        let c_name = Self::c_string(name)?;
        let find_class = jni_fn!(self.table(), FindClass);
        // SAFETY: valid environment, NUL-terminated name.
        let class = unsafe { find_class(self.env, c_name.as_ptr()) };
        self.checked(class, || lookup_error!("FindClass({}) failed", name))
    }

    fn method_id(&self, class: JRef, name: &str, signature: &str) -> Result<JMethod> {
        self.lookup_member(class, name, signature, false).map(JMethod)
    }

    fn static_method_id(&self, class: JRef, name: &str, signature: &str) -> Result<JMethod> {
        self.lookup_member(class, name, signature, true).map(JMethod)
    }

    fn static_field_id(&self, class: JRef, name: &str, signature: &str) -> Result<JField> {
        let c_name = Self::c_string(name)?;
        let c_signature = Self::c_string(signature)?;
        let get_static_field_id = jni_fn!(self.table(), GetStaticFieldID);
        // SAFETY: valid environment and class, NUL-terminated strings.
        let field =
            unsafe { get_static_field_id(self.env, class.0, c_name.as_ptr(), c_signature.as_ptr()) };
        if self.clear_exception() || field.is_null() {
            return Err(lookup_error!("GetStaticFieldID({}#{}) failed", name, signature));
        }
        Ok(JField(field))
    }

    fn static_object_field(&self, class: JRef, field: JField) -> Result<JRef> {
        let get_static_object_field = jni_fn!(self.table(), GetStaticObjectField);
        // SAFETY: field id was resolved against `class`.
        let value = unsafe { get_static_object_field(self.env, class.0, field.0) };
        self.checked(value, || lookup_error!("GetStaticObjectField returned null"))
    }

    fn new_string(&self, value: &str) -> Result<JRef> {
        let c_value = Self::c_string(value)?;
        let new_string_utf = jni_fn!(self.table(), NewStringUTF);
        // SAFETY: valid environment, NUL-terminated modified UTF-8 (ASCII in practice).
        let string = unsafe { new_string_utf(self.env, c_value.as_ptr()) };
        self.checked(string, || construction_error!("NewStringUTF({}) failed", value))
    }

    fn new_object_array(&self, len: usize, element_class: JRef) -> Result<JRef> {
        let len = jsize::try_from(len)
            .map_err(|_| construction_error!("array length {} exceeds jsize", len))?;
        let new_object_array = jni_fn!(self.table(), NewObjectArray);
        // SAFETY: valid environment and class reference; a null initial element is allowed.
        let array =
            unsafe { new_object_array(self.env, len, element_class.0, ptr::null_mut()) };
        self.checked(array, || {
            construction_error!("NewObjectArray({}) failed", len)
        })
    }

    fn set_object_array_element(&self, array: JRef, index: usize, value: JRef) -> Result<()> {
        let index = jsize::try_from(index)
            .map_err(|_| construction_error!("array index {} exceeds jsize", index))?;
        let set = jni_fn!(self.table(), SetObjectArrayElement);
        // SAFETY: `array` is a live object array; bounds and store checks raise exceptions.
        unsafe { set(self.env, array.0, index, value.0) };
        if self.clear_exception() {
            return Err(construction_error!("SetObjectArrayElement({}) failed", index));
        }
        Ok(())
    }

    fn new_object(&self, class: JRef, constructor: JMethod, args: &[JValue<JRef>]) -> Result<JRef> {
        let raw = Self::marshal(args)?;
        let new_object = jni_fn!(self.table(), NewObjectA);
        // SAFETY: constructor resolved against `class`, arguments marshalled per signature.
        let object = unsafe { new_object(self.env, class.0, constructor.0, raw.as_ptr()) };
        self.checked(object, || construction_error!("NewObject failed"))
    }

    fn call_static_object_method(
        &self,
        class: JRef,
        method: JMethod,
        args: &[JValue<JRef>],
    ) -> Result<JRef> {
        let raw = Self::marshal(args)?;
        let call = jni_fn!(self.table(), CallStaticObjectMethodA);
        // SAFETY: method resolved against `class`, arguments marshalled per signature.
        let result = unsafe { call(self.env, class.0, method.0, raw.as_ptr()) };
        self.checked(result, || Error::Exception("CallStaticObjectMethod".to_string()))
    }

    fn call_object_method(
        &self,
        object: JRef,
        method: JMethod,
        args: &[JValue<JRef>],
    ) -> Result<JRef> {
        let raw = Self::marshal(args)?;
        let call = jni_fn!(self.table(), CallObjectMethodA);
        // SAFETY: method resolved against the receiver's class hierarchy.
        let result = unsafe { call(self.env, object.0, method.0, raw.as_ptr()) };
        self.checked(result, || Error::Exception("CallObjectMethod".to_string()))
    }

    fn call_void_method(&self, object: JRef, method: JMethod, args: &[JValue<JRef>]) -> Result<()> {
        let raw = Self::marshal(args)?;
        let call = jni_fn!(self.table(), CallVoidMethodA);
        // SAFETY: method resolved against the receiver's class hierarchy.
        unsafe { call(self.env, object.0, method.0, raw.as_ptr()) };
        if self.clear_exception() {
            return Err(Error::Exception("CallVoidMethod".to_string()));
        }
        Ok(())
    }

    fn new_global_ref(&self, object: JRef) -> Result<JRef> {
        let new_global_ref = jni_fn!(self.table(), NewGlobalRef);
        // SAFETY: valid environment and reference.
        let global = unsafe { new_global_ref(self.env, object.0) };
        self.checked(global, || construction_error!("NewGlobalRef failed"))
    }

    fn delete_local_ref(&self, object: JRef) {
        if object.is_null() {
            return;
        }
        match self.table().DeleteLocalRef {
            // SAFETY: `object` is a live local reference of this thread.
            Some(delete) => unsafe { delete(self.env, object.0) },
            None => debug!("DeleteLocalRef is not available"),
        }
    }

    fn delete_global_ref(&self, object: JRef) {
        if object.is_null() {
            return;
        }
        match self.table().DeleteGlobalRef {
            // SAFETY: `object` is a live global reference.
            Some(delete) => unsafe { delete(self.env, object.0) },
            None => debug!("DeleteGlobalRef is not available"),
        }
    }

    fn exception_pending(&self) -> bool {
        match self.table().ExceptionCheck {
            // SAFETY: valid environment per `from_raw`.
            Some(check) => unsafe { check(self.env) == JNI_TRUE },
            None => false,
        }
    }
}
