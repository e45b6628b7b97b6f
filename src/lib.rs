// Copyright 2025 The jni-critical-reporter Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::missing_safety_doc)]

//! # jni-critical-reporter
//!
//! A JVMTI agent that reports every use of the JNI *critical* functions as a Java
//! Flight Recorder event.
//!
//! `GetStringCritical` and `GetPrimitiveArrayCritical` hand native code a raw pointer
//! into the Java heap. While such a region is open the garbage collector may be
//! blocked or forced to pin memory, so long or frequent critical sections show up as
//! latency that is hard to attribute. The agent measures each outermost critical
//! section of a thread as one `com.github.marschall.jnicriticalreporter.Event` with
//! two fields:
//!
//! | Field | Type | Meaning |
//! |-------|------|---------|
//! | `copied` | `boolean` | whether the runtime copied the data instead of pinning it |
//! | `operation` | `String` | `GetStringCritical` or `GetPrimitiveArrayCritical` |
//!
//! Start and end time come from JFR's own `begin`/`commit`.
//!
//! ## Quick Start
//!
//! Build the `cdylib` and load it at startup:
//!
//! ```bash
//! cargo build --release
//! java -agentpath:target/release/libjni_critical_reporter.so \
//!      -XX:StartFlightRecording=filename=recording.jfr \
//!      -jar app.jar
//! ```
//!
//! Options are passed after `=`; see [`agent::AgentOptions`]:
//!
//! ```bash
//! java -agentpath:target/release/libjni_critical_reporter.so=log=debug ...
//! ```
//!
//! ## Architecture
//!
//! - [`agent`] - Exported entry points, options, logging and the process-wide [`agent::Registry`]
//! - [`schema`] - Event type description and its registration through `jdk.jfr.EventFactory`
//! - [`emitter`] - Creating, populating and committing a single event
//! - [`correlator`] - Per-thread nesting of critical begin/end calls
//! - [`interceptor`] - JNI function table redirection and the four wrapper functions
//! - [`host`] - Reflection primitives over JNI and JVMTI, behind the [`host::Host`] trait
//! - [`sys`] - Raw FFI bindings
//!
//! The layers only depend downwards. Everything above [`host`] is written against the
//! [`host::Host`] and [`emitter::EventEmitter`] traits and is tested with in-memory
//! implementations, without a JVM.
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, Error>`](Result). Nothing is ever thrown
//! into Java: bootstrap failures disable the agent, emission failures drop a single
//! event, and both are reported through `tracing` on standard error.
//!
//! ```rust
//! use jni_critical_reporter::{schema::critical_event, Error};
//!
//! let event = critical_event();
//! match event.field_index("duration") {
//!     Err(Error::Lookup(message)) => println!("{}", message),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench --bench correlator
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use jni_critical_reporter::prelude::*;
///
/// let event = critical_event();
/// assert_eq!(event.name, EVENT_NAME);
/// assert_eq!(Operation::GetStringCritical.label(), "GetStringCritical");
/// ```
pub mod prelude;

/// Raw JNI and JVMTI bindings.
pub mod sys;

/// Reflection primitives over the managed runtime.
pub mod host;

/// Description and registration of the JFR event type.
///
/// The event type is described by an [`schema::EventTypeDescriptor`] and registered
/// once by a [`schema::SchemaBuilder`], which returns the cached handles needed on the
/// hot path as an [`schema::EventFactoryHandle`].
pub mod schema;

pub mod emitter;

pub mod correlator;

pub mod interceptor;

/// JVMTI agent entry points and lifecycle.
///
/// The exported `Agent_OnLoad`, `Agent_OnAttach` and `Agent_OnUnload` symbols live
/// here and are re-exported at the crate root.
pub mod agent;

pub use agent::{Agent_OnAttach, Agent_OnLoad, Agent_OnUnload};

/// `jni-critical-reporter` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `jni-critical-reporter` Error type
///
/// The main error type for all operations in this crate. See [`Error::is_bootstrap`]
/// for the split between failures that disable the agent and failures that drop a
/// single event.
pub use error::Error;
