//! Agent configuration.
//!
//! The JVM passes everything after `=` in
//! `-agentpath:/path/to/libjni_critical_reporter.so=<options>` (or the options
//! argument of a dynamic attach) to the agent as a single string. [`AgentOptions`]
//! parses it as a comma-separated list of `key=value` pairs:
//!
//! | Key | Values | Default | Meaning |
//! |-----|--------|---------|---------|
//! | `log` | an `EnvFilter` directive | `warn` | Diagnostic verbosity on standard error |
//! | `attach` | `bootstrap`, `require` | `bootstrap` | Late-attach policy, see [`AttachPolicy`] |
//!
//! Commas separate options, so multiple `log` directives are separated with `;`
//! instead: `log=warn;jni_critical_reporter=trace`.
//!
//! # Example
//!
//! ```rust
//! use jni_critical_reporter::agent::{AgentOptions, AttachPolicy};
//!
//! let options: AgentOptions = "log=debug,attach=require".parse().unwrap();
//! assert_eq!(options.log.as_deref(), Some("debug"));
//! assert_eq!(options.attach, AttachPolicy::Require);
//!
//! // Or build them directly
//! let options = AgentOptions::new().with_attach(AttachPolicy::Require);
//! ```

use std::{
    ffi::{c_char, CStr},
    str::FromStr,
};

use strum::{Display, EnumString, VariantNames};
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// What a late attach does when the event schema has not been registered yet.
///
/// The schema is normally registered from the `VMStart` callback of an agent loaded
/// at startup. An agent that is attached to a running VM never sees that callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum AttachPolicy {
    /// Register the schema during the attach, then install the redirection.
    #[default]
    Bootstrap,
    /// Refuse the attach with [`Error::NotBootstrapped`].
    Require,
}

/// Parsed agent options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentOptions {
    /// `EnvFilter` directive for diagnostics.
    ///
    /// When `None`, the `JNI_CRITICAL_REPORTER_LOG` environment variable is consulted,
    /// then `warn` is used.
    pub log: Option<String>,

    /// Late-attach policy.
    pub attach: AttachPolicy,
}

impl AgentOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the diagnostic filter directive.
    ///
    /// # Arguments
    ///
    /// * `directive` - An `EnvFilter` directive such as `debug` or
    ///   `jni_critical_reporter=trace`
    ///
    /// # Returns
    ///
    /// Returns `self` for method chaining.
    #[must_use]
    pub fn with_log(mut self, directive: impl Into<String>) -> Self {
        self.log = Some(directive.into());
        self
    }

    /// Sets the late-attach policy.
    ///
    /// # Returns
    ///
    /// Returns `self` for method chaining.
    #[must_use]
    pub fn with_attach(mut self, attach: AttachPolicy) -> Self {
        self.attach = attach;
        self
    }

    /// Parses the raw options pointer handed to `Agent_OnLoad` / `Agent_OnAttach`.
    ///
    /// A null pointer yields the defaults.
    ///
    /// # Safety
    ///
    /// `options` must be null or point to a NUL-terminated string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the string is not UTF-8 or fails to parse.
    pub unsafe fn from_raw(options: *const c_char) -> Result<Self> {
        if options.is_null() {
            return Ok(Self::default());
        }
        CStr::from_ptr(options)
            .to_str()
            .map_err(|_| Error::InvalidOption("options are not valid UTF-8".to_string()))?
            .parse()
    }
}

impl FromStr for AgentOptions {
    type Err = Error;

    fn from_str(options: &str) -> Result<Self> {
        let mut parsed = AgentOptions::default();

        for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let Some((key, value)) = option.split_once('=') else {
                return Err(Error::InvalidOption(format!("{} is missing a value", option)));
            };
            let value = value.trim();
            match key.trim() {
                "log" => {
                    let directive = value.replace(';', ",");
                    EnvFilter::try_new(&directive).map_err(|e| {
                        Error::InvalidOption(format!("log={} - {}", value, e))
                    })?;
                    parsed.log = Some(directive);
                }
                "attach" => {
                    parsed.attach = value.parse().map_err(|_| {
                        Error::InvalidOption(format!(
                            "attach={} - expected one of {:?}",
                            value,
                            AttachPolicy::VARIANTS
                        ))
                    })?;
                }
                unknown => {
                    return Err(Error::InvalidOption(format!("unknown option {}", unknown)));
                }
            }
        }

        Ok(parsed)
    }
}
