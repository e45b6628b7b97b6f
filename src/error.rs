use thiserror::Error;

macro_rules! lookup_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Lookup($msg.to_string())
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Lookup(format!($fmt, $($arg)*))
    };
}

macro_rules! construction_error {
    ($msg:expr) => {
        crate::Error::Construction($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Construction(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which covers every failure this agent can report.
///
/// The variants follow the phases of the agent: resolving runtime types during the
/// one-shot bootstrap, building the event schema, registering it with the flight
/// recorder, patching the JNI function table, and emitting individual events.
///
/// # Error Categories
///
/// ## Bootstrap Errors
/// - [`Error::Lookup`] - A class, method or field could not be resolved
/// - [`Error::Construction`] - An object, string, array or record could not be built
/// - [`Error::Registration`] - `EventFactory.create` rejected the schema
/// - [`Error::Exception`] - A reflective call threw a Java exception
///
/// ## Redirection Errors
/// - [`Error::Redirection`] - The JNI function table could not be fetched or installed
/// - [`Error::Jvmti`] - A JVMTI function returned a non-zero error code
/// - [`Error::Jni`] - The `JavaVM` refused to hand out an environment
/// - [`Error::AlreadyInstalled`] - The redirection was requested twice
///
/// ## Runtime Errors
/// - [`Error::Emission`] - Starting or committing a single event failed
/// - [`Error::NotBootstrapped`] - The schema handles were required but are absent
///
/// ## Configuration Errors
/// - [`Error::InvalidOption`] - The agent options string could not be parsed
///
/// # Propagation
///
/// None of these errors ever reach the JVM as an exception. Bootstrap and redirection
/// errors disable the feature and are reported on standard error, emission errors are
/// reported and otherwise dropped so the instrumented JNI call still completes.
///
/// # Examples
///
/// ```rust
/// use jni_critical_reporter::{agent::AgentOptions, Error};
///
/// match "attach=sometimes".parse::<AgentOptions>() {
///     Err(Error::InvalidOption(message)) => eprintln!("bad option: {}", message),
///     Err(e) => eprintln!("other error: {}", e),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required class, method or field could not be resolved.
    ///
    /// Raised by `FindClass`, `GetMethodID`, `GetStaticMethodID` and
    /// `GetStaticFieldID` failures, and when a field name is missing from an
    /// event descriptor.
    #[error("Lookup failed - {0}")]
    Lookup(String),

    /// An object, string, array or annotation record could not be constructed.
    #[error("Construction failed - {0}")]
    Construction(String),

    /// The event-recording subsystem rejected the event type.
    ///
    /// `EventFactory.create` threw, typically because the descriptor contains an
    /// invalid name, an unsupported field type or a duplicate field.
    #[error("Registration failed - {0}")]
    Registration(String),

    /// A reflective call threw a Java exception.
    ///
    /// The pending exception has already been cleared when this error is returned.
    /// Callers re-wrap it as [`Error::Registration`] or [`Error::Emission`]
    /// depending on the phase in which it happened.
    #[error("{0} threw")]
    Exception(String),

    /// The JNI function table could not be fetched, patched or installed.
    #[error("Redirection failed - {0}")]
    Redirection(String),

    /// A JVMTI function returned an error code.
    ///
    /// # Fields
    ///
    /// * `code` - The raw `jvmtiError` value
    /// * `context` - The JVMTI function that failed
    #[error("{context} (JVMTI) failed with error({code})")]
    Jvmti {
        /// The raw `jvmtiError` value
        code: u32,
        /// The JVMTI function that failed
        context: &'static str,
    },

    /// A JNI invocation function returned something other than `JNI_OK`.
    #[error("{context} (JNI) failed with error({code})")]
    Jni {
        /// The raw `jint` return value
        code: i32,
        /// The invocation function that failed
        context: &'static str,
    },

    /// Starting, populating or committing a single event failed.
    ///
    /// Never propagated past the correlator; the wrapped JNI call completes normally.
    #[error("Emission failed - {0}")]
    Emission(String),

    /// The schema handles are required but the bootstrap has not completed.
    #[error("The event schema has not been bootstrapped")]
    NotBootstrapped,

    /// The JNI function table redirection has already been installed in this process.
    #[error("The JNI function table redirection is already installed")]
    AlreadyInstalled,

    /// The agent options string is malformed or names an unknown option.
    #[error("Invalid agent option - {0}")]
    InvalidOption(String),
}

impl Error {
    /// Re-classifies a bootstrap error raised while calling `EventFactory.create`.
    ///
    /// Lookups stay lookups; everything else becomes [`Error::Registration`].
    #[must_use]
    pub fn into_registration(self) -> Self {
        match self {
            Error::Lookup(_) | Error::Registration(_) => self,
            other => Error::Registration(other.to_string()),
        }
    }

    /// Re-classifies an error raised while patching the JNI function table.
    ///
    /// JVMTI failures become [`Error::Redirection`] carrying the failing function
    /// and code; [`Error::AlreadyInstalled`] is kept so callers can tell it apart.
    #[must_use]
    pub fn into_redirection(self) -> Self {
        match self {
            Error::Redirection(_) | Error::AlreadyInstalled => self,
            other => Error::Redirection(other.to_string()),
        }
    }

    /// Re-classifies any error raised on the hot path as [`Error::Emission`].
    #[must_use]
    pub fn into_emission(self) -> Self {
        match self {
            Error::Emission(_) => self,
            other => Error::Emission(other.to_string()),
        }
    }

    /// Returns true if this error aborts the bootstrap phase.
    #[must_use]
    pub fn is_bootstrap(&self) -> bool {
        matches!(
            self,
            Error::Lookup(_) | Error::Construction(_) | Error::Registration(_) | Error::Exception(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_macros() {
        assert_eq!(
            lookup_error!("FindClass({}) failed", "jdk/jfr/Event"),
            Error::Lookup("FindClass(jdk/jfr/Event) failed".to_string())
        );
        assert_eq!(
            construction_error!("NewStringUTF failed"),
            Error::Construction("NewStringUTF failed".to_string())
        );
    }

    #[test]
    fn test_reclassification() {
        let threw = Error::Exception("EventFactory.create()".to_string());
        assert!(matches!(threw.clone().into_registration(), Error::Registration(_)));
        assert!(matches!(threw.into_emission(), Error::Emission(_)));

        let missing = lookup_error!("GetMethodID(newEvent) failed");
        assert_eq!(missing.clone().into_registration(), missing);

        let refused = Error::Jvmti {
            code: 112,
            context: "SetJNIFunctionTable",
        };
        assert_eq!(
            refused.into_redirection(),
            Error::Redirection("SetJNIFunctionTable (JVMTI) failed with error(112)".to_string())
        );
        assert_eq!(
            Error::AlreadyInstalled.into_redirection(),
            Error::AlreadyInstalled
        );
    }

    #[test]
    fn test_display() {
        let err = Error::Jvmti {
            code: 112,
            context: "GetJNIFunctionTable",
        };
        assert_eq!(
            err.to_string(),
            "GetJNIFunctionTable (JVMTI) failed with error(112)"
        );
        assert!(Error::Registration("x".into()).is_bootstrap());
        assert!(!Error::AlreadyInstalled.is_bootstrap());
    }
}
