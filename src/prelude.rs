//! # jni-critical-reporter Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the agent. Import it to describe, register and emit events, or to drive the
//! correlator from a custom host.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all agent operations
pub use crate::Error;

/// The result type used throughout the agent
pub use crate::Result;

// ================================================================================================
// Event Schema
// ================================================================================================

/// The critical event and its field names
pub use crate::schema::{critical_event, COPIED_FIELD, EVENT_NAME, OPERATION_FIELD};

/// Building blocks for describing an event type
pub use crate::schema::{
    Annotation, AnnotationValue, EventTypeDescriptor, FieldDescriptor, FieldType, Operation,
};

/// Registration and the cached handles it produces
pub use crate::schema::{EventFactoryHandle, SchemaBuilder};

// ================================================================================================
// Runtime
// ================================================================================================

/// Reflection primitives and their JNI implementation
pub use crate::host::{Host, JValue, JniHost, Jvmti};

/// Event emission
pub use crate::emitter::{EventEmitter, FactoryEmitter};

/// Per-thread call correlation
pub use crate::correlator::{CallState, CopySlot};

/// JNI table redirection
pub use crate::interceptor::Redirector;

// ================================================================================================
// Agent
// ================================================================================================

/// Agent configuration and process-wide state
pub use crate::agent::{AgentOptions, AttachPolicy, Registry};
